//! 静的カタログ: 自動化ツール、プレミアムアイテム、コインパッケージ、コイン両替。
//! ここにあるのはすべて不変の参照データ。

use serde::Serialize;

use super::state::PremiumItemType;

/// 自動化ツール価格の既定の増加率。
pub const DEFAULT_COST_MULTIPLIER: f64 = 1.15;

/// 自動化ツールのカタログ項目。
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ToolDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// 1 台目の価格。
    pub base_cost: i64,
    /// 1 台あたりの毎秒生産額。
    pub base_production: f64,
    pub cost_multiplier: f64,
}

const fn tool(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    base_cost: i64,
    base_production: f64,
) -> ToolDef {
    ToolDef {
        id,
        name,
        description,
        base_cost,
        base_production,
        cost_multiplier: DEFAULT_COST_MULTIPLIER,
    }
}

/// 全自動化ツール (表示順)。
pub const AUTOMATION_TOOLS: &[ToolDef] = &[
    tool("basic_printer", "Basic Printer", "Simple money printer", 10, 0.1),
    tool("enhanced_printer", "Enhanced Printer", "Faster money printing", 100, 1.0),
    tool("money_press", "Money Press", "Industrial money pressing", 1_000, 8.0),
    tool("industrial_printer", "Industrial Printer", "High-volume printing", 12_000, 47.0),
    tool("money_factory", "Money Factory", "Automated money production", 130_000, 260.0),
    tool("mega_factory", "Mega Factory", "Massive money operation", 1_400_000, 1_400.0),
    tool("corporate_empire", "Corporate Empire", "Global money empire", 20_000_000, 7_800.0),
];

pub fn find_tool(id: &str) -> Option<&'static ToolDef> {
    AUTOMATION_TOOLS.iter().find(|t| t.id == id)
}

/// コインで買うプレミアムアイテムのカタログ項目。
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PremiumItem {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub coin_cost: i32,
    pub kind: PremiumItemType,
    pub effect_value: f64,
    /// 永続アイテムは 0。
    pub duration_minutes: u32,
}

impl PremiumItem {
    pub fn is_permanent(&self) -> bool {
        self.kind.is_permanent()
    }

    /// Boost lifetime in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.duration_minutes as i64 * 60_000
    }
}

pub const SUPER_PRINTER: &str = "super_printer";
pub const GOLDEN_TOUCH: &str = "golden_touch";
pub const TIME_ACCELERATOR: &str = "time_accelerator";
pub const MONEY_MAGNET: &str = "money_magnet";
pub const MEGA_BOOST: &str = "mega_boost";

pub const PREMIUM_ITEMS: &[PremiumItem] = &[
    PremiumItem {
        id: SUPER_PRINTER,
        name: "Super Printer",
        description: "2x all automation permanently",
        coin_cost: 150,
        kind: PremiumItemType::PermanentAutomationMultiplier,
        effect_value: 2.0,
        duration_minutes: 0,
    },
    PremiumItem {
        id: GOLDEN_TOUCH,
        name: "Golden Touch",
        description: "10x click value permanently",
        coin_cost: 300,
        kind: PremiumItemType::PermanentClickMultiplier,
        effect_value: 10.0,
        duration_minutes: 0,
    },
    PremiumItem {
        id: TIME_ACCELERATOR,
        name: "Time Accelerator",
        description: "3x production for 2 hours",
        coin_cost: 200,
        kind: PremiumItemType::TemporaryProductionBoost,
        effect_value: 3.0,
        duration_minutes: 120,
    },
    PremiumItem {
        id: MONEY_MAGNET,
        name: "Money Magnet",
        description: "Auto-collect 5% production per second",
        coin_cost: 400,
        kind: PremiumItemType::TemporaryAutoCollect,
        effect_value: 0.05,
        duration_minutes: 60,
    },
    PremiumItem {
        id: MEGA_BOOST,
        name: "Mega Boost",
        description: "10x all production for 30 minutes",
        coin_cost: 500,
        kind: PremiumItemType::TemporaryMegaBoost,
        effect_value: 10.0,
        duration_minutes: 30,
    },
];

pub fn find_premium_item(id: &str) -> Option<&'static PremiumItem> {
    PREMIUM_ITEMS.iter().find(|i| i.id == id)
}

/// 購入できるコインのまとめ売り (決済プロバイダ経由の課金)。
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CoinPackage {
    pub id: &'static str,
    pub coin_amount: i32,
    pub bonus_coins: i32,
    pub price_usd: &'static str,
    pub label: &'static str,
    pub is_popular: bool,
}

impl CoinPackage {
    /// 決済成功時に加算するコイン数。
    pub fn total_coins(&self) -> i32 {
        self.coin_amount.saturating_add(self.bonus_coins)
    }
}

pub const COIN_PACKAGES: &[CoinPackage] = &[
    CoinPackage {
        id: "small",
        coin_amount: 100,
        bonus_coins: 0,
        price_usd: "$0.99",
        label: "Starter Pack",
        is_popular: false,
    },
    CoinPackage {
        id: "medium",
        coin_amount: 500,
        bonus_coins: 50,
        price_usd: "$4.99",
        label: "+50 Bonus",
        is_popular: true,
    },
    CoinPackage {
        id: "large",
        coin_amount: 1_200,
        bonus_coins: 200,
        price_usd: "$9.99",
        label: "+200 Bonus",
        is_popular: false,
    },
    CoinPackage {
        id: "mega",
        coin_amount: 2_800,
        bonus_coins: 500,
        price_usd: "$19.99",
        label: "+500 Bonus",
        is_popular: false,
    },
    CoinPackage {
        id: "ultimate",
        coin_amount: 6_000,
        bonus_coins: 1_000,
        price_usd: "$39.99",
        label: "+1000 Bonus",
        is_popular: false,
    },
];

pub fn find_coin_package(id: &str) -> Option<&'static CoinPackage> {
    COIN_PACKAGES.iter().find(|p| p.id == id)
}

/// コインから現金への固定レート両替。
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CoinExchangeOption {
    pub coins_required: i32,
    pub cash_received: i64,
    pub bonus_percentage: u32,
    pub description: &'static str,
}

impl CoinExchangeOption {
    pub fn is_popular(&self) -> bool {
        self.bonus_percentage >= 20
    }
}

pub const EXCHANGE_OPTIONS: &[CoinExchangeOption] = &[
    CoinExchangeOption {
        coins_required: 1,
        cash_received: 100,
        bonus_percentage: 0,
        description: "Basic exchange",
    },
    CoinExchangeOption {
        coins_required: 10,
        cash_received: 1_100,
        bonus_percentage: 10,
        description: "10% bonus",
    },
    CoinExchangeOption {
        coins_required: 50,
        cash_received: 6_000,
        bonus_percentage: 20,
        description: "20% bonus",
    },
    CoinExchangeOption {
        coins_required: 100,
        cash_received: 13_000,
        bonus_percentage: 30,
        description: "30% bonus",
    },
];
