//! ヘッドレス実行: セーブを読み込み、しばらく遊ばせてから保存し、
//! 最終スナップショットを JSON で出力する。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use money_printer::{
    GameEngine, GameRepository, JsonFileStore, MockPaymentProvider, Session, SessionConfig,
    SystemClock,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    save: Option<PathBuf>,
    seconds: Option<u64>,
    clicks: Option<u32>,
    buy: Vec<String>,
    coins: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next().map(PathBuf::from),
            "--save" => args.save = it.next().map(PathBuf::from),
            "--seconds" => args.seconds = it.next().and_then(|s| s.parse().ok()),
            "--clicks" => args.clicks = it.next().and_then(|s| s.parse().ok()),
            "--buy" => args.buy.extend(it.next()),
            "--coins" => args.coins = it.next(),
            _ => {}
        }
    }
    args
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    info!(?args, "starting");

    let config = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    let save_path = args
        .save
        .clone()
        .unwrap_or_else(|| PathBuf::from("money-printer-save.json"));
    let store = JsonFileStore::open(&save_path)
        .with_context(|| format!("opening save {}", save_path.display()))?;

    let session = Session::start(
        GameEngine::new(Arc::new(SystemClock)),
        GameRepository::new(store),
        config,
    );

    if let Some(package) = &args.coins {
        let provider = MockPaymentProvider::default();
        match session.purchase_coins(&provider, package).await {
            Ok(coins) => info!(package = %package, coins, "coins purchased"),
            Err(e) => warn!(error = %e, "coin purchase failed"),
        }
    }
    for _ in 0..args.clicks.unwrap_or(0) {
        session.click().await;
    }
    for tool in &args.buy {
        if let Err(e) = session.purchase_automation(tool).await {
            warn!(tool = %tool, error = %e, "purchase failed");
        }
    }

    tokio::time::sleep(Duration::from_secs(args.seconds.unwrap_or(0))).await;

    let snapshot = session.snapshot();
    session.shutdown().await.context("final save")?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
