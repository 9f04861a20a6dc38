//! セッション設定。

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::StoreError;

/// オフライン収益の上限は 4 時間分。
pub const MAX_OFFLINE_MS: i64 = 4 * 60 * 60 * 1000;

/// 1 分以下の不在はオフライン収益を計算しない。
pub const MIN_OFFLINE_MS: i64 = 60 * 1000;

/// 実行中セッションの調整値。全フィールドにデフォルトがあるので、
/// 設定ファイルには上書きしたい値だけ書けばよい。
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 1 秒あたりの経済 tick 数。
    pub ticks_per_second: u32,
    /// 期限切れブーストを掃除する間隔 (ms)。
    pub sweep_interval_ms: u64,
    /// オートセーブの間隔 (ms)。0 で無効。
    pub autosave_interval_ms: u64,
    pub max_offline_ms: i64,
    pub min_offline_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 10,
            sweep_interval_ms: 1_000,
            autosave_interval_ms: 30_000,
            max_offline_ms: MAX_OFFLINE_MS,
            min_offline_ms: MIN_OFFLINE_MS,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.ticks_per_second.max(1) as u64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    pub fn autosave_interval(&self) -> Option<Duration> {
        (self.autosave_interval_ms > 0).then(|| Duration::from_millis(self.autosave_interval_ms))
    }
}
