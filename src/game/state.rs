//! Money Printer の状態定義。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::catalog::{ToolDef, AUTOMATION_TOOLS};
use crate::error::UnknownItemType;

/// プレミアム効果の種別。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PremiumItemType {
    PermanentAutomationMultiplier,
    PermanentClickMultiplier,
    TemporaryProductionBoost,
    TemporaryAutoCollect,
    TemporaryMegaBoost,
}

impl PremiumItemType {
    pub fn all() -> &'static [PremiumItemType] {
        &[
            PremiumItemType::PermanentAutomationMultiplier,
            PremiumItemType::PermanentClickMultiplier,
            PremiumItemType::TemporaryProductionBoost,
            PremiumItemType::TemporaryAutoCollect,
            PremiumItemType::TemporaryMegaBoost,
        ]
    }

    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            PremiumItemType::PermanentAutomationMultiplier
                | PremiumItemType::PermanentClickMultiplier
        )
    }

    /// 保存されるブーストレコードで使う名前。
    pub fn as_str(&self) -> &'static str {
        match self {
            PremiumItemType::PermanentAutomationMultiplier => "PERMANENT_AUTOMATION_MULTIPLIER",
            PremiumItemType::PermanentClickMultiplier => "PERMANENT_CLICK_MULTIPLIER",
            PremiumItemType::TemporaryProductionBoost => "TEMPORARY_PRODUCTION_BOOST",
            PremiumItemType::TemporaryAutoCollect => "TEMPORARY_AUTO_COLLECT",
            PremiumItemType::TemporaryMegaBoost => "TEMPORARY_MEGA_BOOST",
        }
    }
}

impl fmt::Display for PremiumItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PremiumItemType {
    type Err = UnknownItemType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PremiumItemType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownItemType(s.to_string()))
    }
}

/// カタログのツールとプレイヤーの所持数。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AutomationTool {
    #[serde(flatten)]
    pub def: ToolDef,
    pub owned: u32,
}

impl AutomationTool {
    pub fn new(def: ToolDef) -> Self {
        Self { def, owned: 0 }
    }

    pub fn id(&self) -> &'static str {
        self.def.id
    }

    /// Price of the next unit: floor(base * multiplier^owned), saturating at i64::MAX.
    pub fn cost(&self) -> i64 {
        cost_at(&self.def, self.owned)
    }

    /// Cash per second from all owned units, before premium multipliers.
    pub fn production(&self) -> f64 {
        self.def.base_production * self.owned as f64
    }
}

/// Price of a tool when `owned` copies are already held.
pub fn cost_at(def: &ToolDef, owned: u32) -> i64 {
    let raw = (def.base_cost as f64 * def.cost_multiplier.powf(owned as f64)).floor();
    if !raw.is_finite() || raw >= i64::MAX as f64 {
        i64::MAX
    } else if raw <= 0.0 {
        0
    } else {
        raw as i64
    }
}

/// 何も所持していないツールカタログの作業用コピー。
pub fn catalog_tools() -> Vec<AutomationTool> {
    AUTOMATION_TOOLS.iter().copied().map(AutomationTool::new).collect()
}

/// プレイヤー 1 人分の保存される経済状態。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub cash: i64,
    pub coins: i32,
    /// tool id -> owned count.
    pub automation_tools: BTreeMap<String, u32>,
    pub total_earned: i64,
    /// 最後にセーブしたエポックミリ秒。
    pub last_save_time: i64,
}

impl GameState {
    pub fn new(now_ms: i64) -> Self {
        Self {
            last_save_time: now_ms,
            ..Self::default()
        }
    }

    pub fn owned(&self, tool_id: &str) -> u32 {
        self.automation_tools.get(tool_id).copied().unwrap_or(0)
    }

    /// 稼いだ現金を加算する。所持金と累計の両方に入る。
    pub(crate) fn credit(&mut self, amount: i64) {
        self.cash = self.cash.saturating_add(amount);
        self.total_earned = self.total_earned.saturating_add(amount);
    }
}

/// 発動中の時間制プレミアム効果。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveBoost {
    pub item_id: String,
    pub kind: PremiumItemType,
    pub effect_value: f64,
    /// 効果が切れるエポックミリ秒。
    pub end_time: i64,
}

impl ActiveBoost {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.end_time <= now_ms
    }

    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        (self.end_time - now_ms).max(0)
    }
}

/// 有効なブーストの表示用データ。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoostSummary {
    pub name: String,
    pub remaining_ms: i64,
}
