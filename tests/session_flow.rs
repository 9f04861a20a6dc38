//! Cold start, play, save and reload against a real save file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use money_printer::game::catalog::SUPER_PRINTER;
use money_printer::{
    Clock, GameEngine, GameRepository, JsonFileStore, KeyValueStore, ManualClock,
    MockPaymentProvider, Session, SessionConfig,
};

const HOUR: i64 = 3_600_000;

fn save_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("money-printer-it-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("save.json");
    let _ = std::fs::remove_file(&path);
    path
}

fn quiet_config() -> SessionConfig {
    SessionConfig {
        autosave_interval_ms: 0,
        ..SessionConfig::default()
    }
}

fn start(path: &PathBuf, clock: &ManualClock) -> Session<JsonFileStore> {
    Session::start(
        GameEngine::new(Arc::new(clock.clone())),
        GameRepository::new(JsonFileStore::open(path).unwrap()),
        quiet_config(),
    )
}

#[tokio::test]
async fn cold_start_play_save_reload() {
    let path = save_path("reload");
    let clock = ManualClock::new(1_700_000_000_000);

    let session = start(&path, &clock);
    assert_eq!(session.offline_earnings(), 0);
    for _ in 0..120 {
        session.click().await;
    }
    assert_eq!(session.purchase_automation("enhanced_printer").await, Ok(100));
    let provider = MockPaymentProvider::new(Duration::ZERO);
    assert_eq!(session.purchase_coins(&provider, "small").await, Ok(100));
    assert!(session.purchase_premium_item(SUPER_PRINTER).await.is_err());
    let before = session.snapshot();
    session.shutdown().await.unwrap();

    // The economy loop cannot advance a manual clock, so only intents changed
    // the state.
    assert_eq!(before.state.cash, 20);
    assert_eq!(before.state.coins, 100);

    clock.advance(HOUR);
    let session = start(&path, &clock);
    // enhanced_printer: 1.0/sec for an hour
    assert_eq!(session.offline_earnings(), 3_600);
    let snap = session.snapshot();
    assert_eq!(snap.state.cash, 3_620);
    assert_eq!(snap.state.total_earned, 3_720);
    assert_eq!(snap.state.coins, 100);
    assert_eq!(snap.tools[1].owned, 1);
    session.shutdown().await.unwrap();

    let store = JsonFileStore::open(&path).unwrap();
    assert_eq!(store.get_i64("last_save_time").unwrap(), Some(clock.now_ms()));
    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn offline_earnings_cap_at_four_hours() {
    let path = save_path("cap");
    let clock = ManualClock::new(1_700_000_000_000);

    let session = start(&path, &clock);
    for _ in 0..100 {
        session.click().await;
    }
    session.purchase_automation("enhanced_printer").await.unwrap();
    session.shutdown().await.unwrap();

    clock.advance(24 * HOUR);
    let session = start(&path, &clock);
    assert_eq!(session.offline_earnings(), 4 * 3_600);
    session.shutdown().await.unwrap();
    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn premium_boost_expires_across_restart() {
    let path = save_path("boost");
    let clock = ManualClock::new(1_700_000_000_000);

    let session = start(&path, &clock);
    let provider = MockPaymentProvider::new(Duration::ZERO);
    session.purchase_coins(&provider, "large").await.unwrap();
    session.purchase_premium_item("mega_boost").await.unwrap();
    session.purchase_premium_item(SUPER_PRINTER).await.unwrap();
    assert_eq!(session.snapshot().active_boosts.len(), 1);
    session.shutdown().await.unwrap();

    clock.advance(HOUR);
    let session = start(&path, &clock);
    let snap = session.snapshot();
    assert!(snap.active_boosts.is_empty());
    assert_eq!(snap.owned_items, vec![SUPER_PRINTER.to_string()]);
    assert_eq!(snap.state.coins, 1_400 - 500 - 150);
    session.shutdown().await.unwrap();
    std::fs::remove_file(&path).unwrap();
}
