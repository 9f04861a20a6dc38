//! 実行中のゲームセッション。
//!
//! エンジンは 1 つの `RwLock` の中にあり、経済 tick・ブースト掃除・オートセーブの
//! 3 つのバックグラウンドタスクがこれを共有する。変更のたびに [`EngineSnapshot`] を
//! `watch` チャネルへ流すので、読み手はロックを取らない。
//! ユーザー操作は [`Session`] のメソッド経由で、1 回の書き込みロックの中で状態を変え、
//! 購入はその場で保存する。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{StoreError, TransactionError};
use crate::game::engine::{EngineSnapshot, GameEngine};
use crate::game::save::GameRepository;
use crate::payment::PaymentProvider;
use crate::store::KeyValueStore;
use crate::time::TickClock;

pub struct Session<S> {
    engine: Arc<RwLock<GameEngine>>,
    repo: Arc<Mutex<GameRepository<S>>>,
    snapshot_tx: Arc<watch::Sender<EngineSnapshot>>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
    offline_earnings: i64,
}

impl<S: KeyValueStore + 'static> Session<S> {
    /// セーブを `engine` に読み込み、オフライン収益を加算してからタスクを起動する。
    /// Tokio ランタイム内で呼ぶこと。
    pub fn start(engine: GameEngine, repo: GameRepository<S>, config: SessionConfig) -> Self {
        let mut engine = engine.with_offline_cap(config.max_offline_ms);
        let now = engine.now_ms();

        let state = repo.load_game_state(now);
        let offline_ms = repo.offline_time(now);
        engine.set_state(state);
        let (owned, boosts) = repo.load_premium_data(now);
        engine.load_premium_data(owned, boosts);

        // 最初の経済 tick より前に終わらせる。
        let offline_earnings = engine.reconcile_offline(offline_ms, config.min_offline_ms);
        info!(
            offline_ms,
            offline_earnings,
            cash = engine.state().cash,
            "session started"
        );

        let (snapshot_tx, _) = watch::channel(engine.snapshot());
        let snapshot_tx = Arc::new(snapshot_tx);
        let (shutdown_tx, _) = broadcast::channel(1);
        let engine = Arc::new(RwLock::new(engine));
        let repo = Arc::new(Mutex::new(repo));

        let mut tasks = vec![
            tokio::spawn(run_economy_loop(
                engine.clone(),
                snapshot_tx.clone(),
                config.clone(),
                shutdown_tx.subscribe(),
            )),
            tokio::spawn(run_sweep_loop(
                engine.clone(),
                snapshot_tx.clone(),
                config.sweep_interval(),
                shutdown_tx.subscribe(),
            )),
        ];
        if let Some(period) = config.autosave_interval() {
            tasks.push(tokio::spawn(run_autosave_loop(
                engine.clone(),
                repo.clone(),
                period,
                shutdown_tx.subscribe(),
            )));
        }

        Self {
            engine,
            repo,
            snapshot_tx,
            shutdown_tx,
            tasks,
            offline_earnings,
        }
    }

    /// セッション開始時に加算したオフライン収益。
    pub fn offline_earnings(&self) -> i64 {
        self.offline_earnings
    }

    pub fn engine(&self) -> Arc<RwLock<GameEngine>> {
        self.engine.clone()
    }

    pub fn repository(&self) -> Arc<Mutex<GameRepository<S>>> {
        self.repo.clone()
    }

    /// 最新のスナップショット。
    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn click(&self) -> i64 {
        let mut engine = self.engine.write().await;
        let value = engine.process_click();
        self.snapshot_tx.send_replace(engine.snapshot());
        value
    }

    pub async fn purchase_automation(&self, tool_id: &str) -> Result<i64, TransactionError> {
        let cost = self.transact(|e| e.try_purchase_automation(tool_id)).await?;
        self.save_logged().await;
        Ok(cost)
    }

    /// Buy a premium item at its catalog price.
    pub async fn purchase_premium_item(&self, item_id: &str) -> Result<(), TransactionError> {
        self.transact(|e| e.try_purchase_catalog_item(item_id)).await?;
        self.save_logged().await;
        Ok(())
    }

    /// Exchange coins using the catalog option at `index`.
    pub async fn exchange(&self, index: usize) -> Result<(), TransactionError> {
        self.transact(|e| e.try_exchange_option(index)).await?;
        self.save_logged().await;
        Ok(())
    }

    /// `provider` 経由でコインパッケージを買う。決済待ちの間はエンジンをロックしない。
    /// 加算したコイン数を返す。
    pub async fn purchase_coins<P: PaymentProvider>(
        &self,
        provider: &P,
        package_id: &str,
    ) -> Result<i32, TransactionError> {
        let outcome = provider.purchase(package_id).await;
        debug!(package = package_id, ?outcome, "payment finished");
        let coins = self.transact(|e| e.apply_payment(&outcome)).await?;
        if coins > 0 {
            self.save_logged().await;
        }
        Ok(coins)
    }

    /// Persist the current state and flush the store.
    pub async fn save(&self) -> Result<(), StoreError> {
        persist(&self.engine, &self.repo).await
    }

    /// バックグラウンドタスクを止めて最終セーブを書く。
    pub async fn shutdown(self) -> Result<(), StoreError> {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "session task ended abnormally");
            }
        }
        persist(&self.engine, &self.repo).await?;
        info!(cash = self.snapshot_tx.borrow().state.cash, "session stopped");
        Ok(())
    }

    async fn transact<T>(
        &self,
        op: impl FnOnce(&mut GameEngine) -> Result<T, TransactionError>,
    ) -> Result<T, TransactionError> {
        let mut engine = self.engine.write().await;
        let result = op(&mut *engine);
        match &result {
            Ok(_) => {
                self.snapshot_tx.send_replace(engine.snapshot());
            }
            Err(e) => debug!(error = %e, "transaction rejected"),
        }
        result
    }

    async fn save_logged(&self) {
        if let Err(e) = self.save().await {
            warn!(error = %e, "save failed");
        }
    }
}

/// ゲーム状態とプレミアムデータを書き込み flush する。
/// ロックはリポジトリ、エンジンの順に取る。
async fn persist<S: KeyValueStore>(
    engine: &RwLock<GameEngine>,
    repo: &Mutex<GameRepository<S>>,
) -> Result<(), StoreError> {
    let mut repo = repo.lock().await;
    {
        let mut engine = engine.write().await;
        let now = engine.now_ms();
        let (owned, boosts) = engine.premium_save_data();
        repo.save_game_state(engine.state(), now);
        repo.save_premium_data(&owned, &boosts);
        engine.mark_saved(now);
    }
    repo.flush()
}

async fn run_economy_loop(
    engine: Arc<RwLock<GameEngine>>,
    snapshot_tx: Arc<watch::Sender<EngineSnapshot>>,
    config: SessionConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let ticks_per_second = config.ticks_per_second.max(1);
    let mut clock = TickClock::new(ticks_per_second);
    let mut tick_interval = interval(config.tick_interval());
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                let mut engine = engine.write().await;
                let ticks = clock.update(engine.now_ms());
                if ticks == 0 {
                    continue;
                }
                engine.tick(ticks, ticks_per_second);
                snapshot_tx.send_replace(engine.snapshot());
            }
            _ = shutdown_rx.recv() => break,
        }
    }
    debug!(total_ticks = clock.total_ticks, "economy loop stopped");
}

async fn run_sweep_loop(
    engine: Arc<RwLock<GameEngine>>,
    snapshot_tx: Arc<watch::Sender<EngineSnapshot>>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut sweep_interval = interval(period);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = sweep_interval.tick() => {
                let mut engine = engine.write().await;
                if engine.sweep_boosts() > 0 {
                    snapshot_tx.send_replace(engine.snapshot());
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}

async fn run_autosave_loop<S: KeyValueStore>(
    engine: Arc<RwLock<GameEngine>>,
    repo: Arc<Mutex<GameRepository<S>>>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut save_interval = interval_at(Instant::now() + period, period);
    save_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = save_interval.tick() => {
                match persist(&engine, &repo).await {
                    Ok(()) => debug!("autosaved"),
                    Err(e) => warn!(error = %e, "autosave failed"),
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock, SystemClock};
    use crate::game::catalog::MEGA_BOOST;
    use crate::payment::{MockBehavior, MockPaymentProvider};
    use crate::store::MemoryStore;

    const HOUR: i64 = 3_600_000;

    fn fast_config() -> SessionConfig {
        SessionConfig {
            ticks_per_second: 50,
            sweep_interval_ms: 10,
            autosave_interval_ms: 25,
            ..SessionConfig::default()
        }
    }

    fn store_with(cash: i64, tools: &[(&str, i32)], saved_at: i64) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.put_i64("cash", cash);
        store.put_i64("total_earned", cash);
        store.put_i64("last_save_time", saved_at);
        for (id, n) in tools {
            store.put_i32(&format!("tool_{id}"), *n);
        }
        store.put_string_set(
            "automation_tool_keys",
            tools.iter().map(|(id, _)| id.to_string()).collect(),
        );
        store
    }

    fn start(store: MemoryStore, config: SessionConfig) -> Session<MemoryStore> {
        Session::start(
            GameEngine::new(Arc::new(SystemClock)),
            GameRepository::new(store),
            config,
        )
    }

    #[tokio::test]
    async fn offline_earnings_credited_at_start() {
        let now = SystemClock.now_ms();
        let session = start(store_with(0, &[("money_press", 1)], now - 2 * HOUR), fast_config());
        let earned = session.offline_earnings();
        assert!((57_600..57_700).contains(&earned), "earned {earned}");
        assert!(session.snapshot().state.cash >= 57_600);
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn short_absence_credits_nothing() {
        let now = SystemClock.now_ms();
        let session = start(store_with(0, &[("money_press", 1)], now - 30_000), fast_config());
        assert_eq!(session.offline_earnings(), 0);
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn economy_loop_credits_production() {
        let now = SystemClock.now_ms();
        let session = start(store_with(0, &[("money_press", 10)], now), fast_config());
        let mut rx = session.subscribe();
        tokio::time::sleep(Duration::from_millis(300)).await;
        rx.changed().await.unwrap();
        assert!(rx.borrow().state.cash > 0);
        assert!((rx.borrow().production_rate - 80.0).abs() < 1e-9);
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn intents_persist_immediately() {
        let now = SystemClock.now_ms();
        let config = SessionConfig {
            autosave_interval_ms: 0,
            ..fast_config()
        };
        let session = start(store_with(1_000, &[], now), config);
        let repo = session.repository();

        assert_eq!(session.purchase_automation("enhanced_printer").await, Ok(100));
        assert!(session.purchase_automation("no_such_tool").await.is_err());
        {
            let repo = repo.lock().await;
            assert_eq!(repo.store().get_i32("tool_enhanced_printer").unwrap(), Some(1));
        }

        let provider = MockPaymentProvider::new(Duration::ZERO);
        assert_eq!(session.purchase_coins(&provider, "small").await, Ok(100));
        assert!(session.purchase_premium_item(MEGA_BOOST).await.is_err());
        assert_eq!(session.exchange(1).await, Ok(()));
        {
            let repo = repo.lock().await;
            assert_eq!(repo.store().get_i32("coins").unwrap(), Some(90));
        }

        let cancelled = MockPaymentProvider::new(Duration::ZERO).with_behavior(MockBehavior::Cancel);
        assert_eq!(session.purchase_coins(&cancelled, "mega").await, Ok(0));
        assert_eq!(session.snapshot().state.coins, 90);
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn clicks_publish_snapshots() {
        let now = SystemClock.now_ms();
        let session = start(store_with(0, &[], now), fast_config());
        assert_eq!(session.click().await, 1);
        assert_eq!(session.click().await, 1);
        assert!(session.snapshot().state.total_earned >= 2);
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn premium_purchase_survives_restart() {
        let now = SystemClock.now_ms();
        let mut store = store_with(0, &[("enhanced_printer", 1)], now);
        store.put_i32("coins", 500);
        let session = start(store, fast_config());
        session.purchase_premium_item(MEGA_BOOST).await.unwrap();
        assert!((session.snapshot().production_rate - 10.0).abs() < 1e-9);
        let repo = session.repository();
        session.shutdown().await.unwrap();

        let store = repo.lock().await.store().clone();
        let restarted = start(store, fast_config());
        let snap = restarted.snapshot();
        assert_eq!(snap.state.coins, 0);
        assert_eq!(snap.active_boosts.len(), 1);
        assert!((snap.production_rate - 10.0).abs() < 1e-9);
        restarted.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn autosave_writes_save_time() {
        let now = SystemClock.now_ms();
        let session = start(store_with(0, &[], now - 10_000), fast_config());
        let repo = session.repository();
        tokio::time::sleep(Duration::from_millis(100)).await;
        {
            let repo = repo.lock().await;
            let saved = repo.store().get_i64("last_save_time").unwrap().unwrap();
            assert!(saved >= now);
        }
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn sweep_task_expires_boosts() {
        let clock = ManualClock::new(1_700_000_000_000);
        let mut store = store_with(0, &[], clock.now_ms());
        store.put_i32("coins", 500);
        let session = Session::start(
            GameEngine::new(Arc::new(clock.clone())),
            GameRepository::new(store),
            SessionConfig {
                sweep_interval_ms: 10,
                autosave_interval_ms: 0,
                ..fast_config()
            },
        );
        session.purchase_premium_item(MEGA_BOOST).await.unwrap();
        assert_eq!(session.snapshot().active_boosts.len(), 1);

        clock.advance(31 * 60_000);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(session.snapshot().active_boosts.is_empty());
        session.shutdown().await.unwrap();
    }
}
