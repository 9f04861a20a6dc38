//! 外部決済を経由したコイン購入。
//!
//! 実装はモックのみ。一定時間待ってから、設定された結果を返す。
//! コインの加算はエンジン側で行う
//! ([`crate::game::engine::GameEngine::apply_payment`])。

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::game::catalog::find_coin_package;

pub const DEFAULT_PAYMENT_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success {
        transaction_id: String,
        package_id: String,
    },
    Failed { reason: String },
    Cancelled,
}

impl PaymentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentOutcome::Success { .. })
    }
}

pub trait PaymentProvider: Send + Sync {
    fn purchase(&self, package_id: &str) -> impl Future<Output = PaymentOutcome> + Send;

    fn validate_purchase(&self, transaction_id: &str) -> impl Future<Output = bool> + Send;

    /// プロバイダが記録している購入のトランザクション ID。
    fn restore_purchases(&self) -> impl Future<Output = Vec<String>> + Send;
}

/// 待ち時間が過ぎたあとにモックが返す結果。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MockBehavior {
    #[default]
    Succeed,
    Fail(String),
    Cancel,
}

#[derive(Clone, Debug)]
pub struct MockPaymentProvider {
    delay: Duration,
    behavior: MockBehavior,
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new(DEFAULT_PAYMENT_DELAY)
    }
}

impl MockPaymentProvider {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            behavior: MockBehavior::Succeed,
        }
    }

    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

impl PaymentProvider for MockPaymentProvider {
    async fn purchase(&self, package_id: &str) -> PaymentOutcome {
        tokio::time::sleep(self.delay).await;
        if find_coin_package(package_id).is_none() {
            return PaymentOutcome::Failed {
                reason: format!("unknown package `{package_id}`"),
            };
        }
        let outcome = match &self.behavior {
            MockBehavior::Succeed => PaymentOutcome::Success {
                transaction_id: format!("txn_{}", Utc::now().timestamp_millis()),
                package_id: package_id.to_string(),
            },
            MockBehavior::Fail(reason) => PaymentOutcome::Failed {
                reason: reason.clone(),
            },
            MockBehavior::Cancel => PaymentOutcome::Cancelled,
        };
        debug!(package = package_id, ?outcome, "mock payment finished");
        outcome
    }

    async fn validate_purchase(&self, _transaction_id: &str) -> bool {
        true
    }

    async fn restore_purchases(&self) -> Vec<String> {
        Vec::new()
    }
}
