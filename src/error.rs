//! エラー型。

use thiserror::Error;

/// エンジンの取引が何も変更しなかった理由。
///
/// bool を返す API ではすべて `false` になる。どれが起きたかは `try_*` 版で分かる。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("unknown automation tool `{0}`")]
    UnknownTool(String),
    #[error("unknown premium item `{0}`")]
    UnknownPremiumItem(String),
    #[error("unknown coin package `{0}`")]
    UnknownCoinPackage(String),
    #[error("no exchange option at index {0}")]
    UnknownExchangeOption(usize),
    #[error("not enough cash: need {needed}, have {available}")]
    InsufficientCash { needed: i64, available: i64 },
    #[error("not enough coins: need {needed}, have {available}")]
    InsufficientCoins { needed: i32, available: i32 },
    #[error("premium item `{0}` is already owned")]
    AlreadyOwned(String),
    #[error("amount must not be negative: {0}")]
    InvalidAmount(i64),
    #[error("cannot own more copies of `{0}`")]
    OwnedLimit(String),
}

/// 永続キーバリューストアの失敗。
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("save file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("save file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save version {found} is older than the minimum supported version {min}")]
    IncompatibleVersion { found: u32, min: u32 },
    #[error("key `{key}` holds a {found}, expected a {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// 保存されたプレミアムアイテム種別名が既知の種別に一致しない。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown premium item type `{0}`")]
pub struct UnknownItemType(pub String);
