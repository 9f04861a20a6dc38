//! Money Printer のゲームロジック。
//! カタログ、状態、プレミアム効果、エンジンと永続化ゲートウェイ。

pub mod catalog;
pub mod engine;
pub mod premium;
pub mod save;
mod simulator;
pub mod state;

pub use engine::{EngineSnapshot, GameEngine, ToolView};
pub use premium::PremiumEffectManager;
pub use save::GameRepository;
pub use state::{ActiveBoost, AutomationTool, BoostSummary, GameState, PremiumItemType};
