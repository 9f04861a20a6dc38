//! 放置系「マネープリンター」の経済エンジン。
//! 自動化ツール、プレミアム効果、オフライン収益、tick 駆動で永続化されるセッションを持つ。

pub mod clock;
pub mod config;
pub mod error;
pub mod game;
pub mod payment;
pub mod session;
pub mod store;
pub mod time;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use error::{StoreError, TransactionError};
pub use game::{EngineSnapshot, GameEngine, GameRepository};
pub use payment::{MockPaymentProvider, PaymentOutcome, PaymentProvider};
pub use session::Session;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
