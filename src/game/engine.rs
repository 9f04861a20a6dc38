//! The game engine: owns the economic state and runs every transaction.
//!
//! Every mutating operation is a single check-then-mutate step on `&mut self`,
//! so a caller holding the engine (or its lock) never sees a half-applied
//! purchase. Failed operations leave the state untouched.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::catalog::{find_coin_package, find_premium_item, EXCHANGE_OPTIONS};
use super::premium::PremiumEffectManager;
use super::state::{catalog_tools, ActiveBoost, AutomationTool, BoostSummary, GameState};
use crate::clock::{Clock, SystemClock};
use crate::config::MAX_OFFLINE_MS;
use crate::error::TransactionError;
use crate::payment::PaymentOutcome;

/// 自動化ツール 1 台あたりのクリックボーナス。
const CLICK_BONUS_PER_TOOL: f64 = 0.1;
const BASE_CLICK_VALUE: f64 = 1.0;

pub struct GameEngine {
    state: GameState,
    /// Catalog copy whose `owned` counts mirror `state.automation_tools`.
    tools: Vec<AutomationTool>,
    premium: PremiumEffectManager,
    clock: Arc<dyn Clock>,
    offline_cap_ms: i64,
    /// まだ加算していない 1 未満の生産分。
    production_carry: f64,
}

impl Default for GameEngine {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl GameEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_ms();
        Self {
            state: GameState::new(now),
            tools: catalog_tools(),
            premium: PremiumEffectManager::new(),
            clock,
            offline_cap_ms: MAX_OFFLINE_MS,
            production_carry: 0.0,
        }
    }

    pub fn with_offline_cap(mut self, cap_ms: i64) -> Self {
        self.offline_cap_ms = cap_ms.max(0);
        self
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Replace the game state and re-sync tool counts from it. The incoming
    /// state is trusted as-is.
    pub fn set_state(&mut self, state: GameState) {
        self.state = state;
        for tool in &mut self.tools {
            tool.owned = self.state.owned(tool.id());
        }
    }

    /// Record that the state was persisted at `now_ms`.
    pub fn mark_saved(&mut self, now_ms: i64) {
        self.state.last_save_time = now_ms;
    }

    pub fn tools(&self) -> &[AutomationTool] {
        &self.tools
    }

    pub fn tool(&self, tool_id: &str) -> Option<&AutomationTool> {
        self.tools.iter().find(|t| t.id() == tool_id)
    }

    pub fn premium(&self) -> &PremiumEffectManager {
        &self.premium
    }

    pub fn load_premium_data(&mut self, owned: BTreeSet<String>, boosts: Vec<ActiveBoost>) {
        let now = self.now_ms();
        self.premium.import_state(owned, boosts, now);
    }

    pub fn premium_save_data(&mut self) -> (BTreeSet<String>, Vec<ActiveBoost>) {
        let now = self.now_ms();
        self.premium.export_state(now)
    }

    /// Expire finished boosts. Returns the number removed.
    pub fn sweep_boosts(&mut self) -> usize {
        let now = self.now_ms();
        self.premium.prune_expired_boosts(now)
    }

    pub fn active_boost_summaries(&mut self) -> Vec<BoostSummary> {
        let now = self.now_ms();
        self.premium.active_boost_summaries(now)
    }

    pub fn auto_collect_rate(&mut self) -> f64 {
        let now = self.now_ms();
        self.premium.auto_collect_rate(now)
    }

    pub fn total_tools_owned(&self) -> u64 {
        self.tools.iter().map(|t| t.owned as u64).sum()
    }

    /// Cash per second from tools, ignoring premium effects.
    pub fn base_production_rate(&self) -> f64 {
        self.tools.iter().map(|t| t.production()).sum()
    }

    /// Cash per second including premium multipliers.
    pub fn production_rate(&mut self) -> f64 {
        let now = self.now_ms();
        self.base_production_rate() * self.premium.automation_multiplier(now)
    }

    /// Value of the next manual click.
    pub fn click_value(&mut self) -> i64 {
        let now = self.now_ms();
        let tool_bonus = 1.0 + CLICK_BONUS_PER_TOOL * self.total_tools_owned() as f64;
        let multiplier = tool_bonus * self.premium.click_multiplier(now);
        to_cash(BASE_CLICK_VALUE * multiplier)
    }

    /// Manual click. Returns the cash credited.
    pub fn process_click(&mut self) -> i64 {
        let value = self.click_value();
        self.state.credit(value);
        value
    }

    /// Credit production for `delta_ticks` economy ticks. Fractions of a unit
    /// are carried to the next tick. Returns the cash credited.
    pub fn tick(&mut self, delta_ticks: u32, ticks_per_second: u32) -> i64 {
        if delta_ticks == 0 {
            return 0;
        }
        let seconds = delta_ticks as f64 / ticks_per_second.max(1) as f64;
        let produced = self.production_rate() * seconds + self.production_carry;
        let whole = produced.floor();
        let credited = to_cash(whole);
        self.production_carry = if credited == i64::MAX { 0.0 } else { produced - whole };
        if credited > 0 {
            self.state.credit(credited);
        }
        credited
    }

    /// Credit production for time spent away, capped at the offline limit.
    /// Returns the amount credited (0 when nothing was earned).
    pub fn compute_offline_earnings(&mut self, elapsed_ms: i64) -> i64 {
        let clamped_ms = elapsed_ms.min(self.offline_cap_ms);
        let earnings = to_cash(self.production_rate() * (clamped_ms as f64 / 1000.0));
        if earnings > 0 {
            self.state.credit(earnings);
            info!(elapsed_ms, clamped_ms, earnings, "offline earnings credited");
        }
        earnings
    }

    /// Start-of-session reconciliation: absences up to `min_offline_ms` are skipped.
    pub fn reconcile_offline(&mut self, elapsed_ms: i64, min_offline_ms: i64) -> i64 {
        if elapsed_ms <= min_offline_ms {
            debug!(elapsed_ms, "offline time below threshold, skipping");
            return 0;
        }
        self.compute_offline_earnings(elapsed_ms)
    }

    pub fn can_afford(&self, tool_id: &str) -> bool {
        self.tool(tool_id)
            .is_some_and(|t| self.state.cash >= t.cost())
    }

    pub fn purchase_automation(&mut self, tool_id: &str) -> bool {
        self.try_purchase_automation(tool_id).is_ok()
    }

    /// Buy one unit of a tool. Returns the price paid.
    pub fn try_purchase_automation(&mut self, tool_id: &str) -> Result<i64, TransactionError> {
        let cash = self.state.cash;
        let tool = self
            .tools
            .iter_mut()
            .find(|t| t.id() == tool_id)
            .ok_or_else(|| TransactionError::UnknownTool(tool_id.to_string()))?;
        let cost = tool.cost();
        if cash < cost {
            return Err(TransactionError::InsufficientCash {
                needed: cost,
                available: cash,
            });
        }
        let owned = tool
            .owned
            .checked_add(1)
            .ok_or_else(|| TransactionError::OwnedLimit(tool_id.to_string()))?;
        tool.owned = owned;
        self.state.cash -= cost;
        self.state.automation_tools.insert(tool_id.to_string(), owned);
        debug!(tool = tool_id, cost, owned, "automation purchased");
        Ok(cost)
    }

    pub fn add_coins(&mut self, amount: i32) {
        if amount <= 0 {
            return;
        }
        self.state.coins = self.state.coins.saturating_add(amount);
    }

    pub fn spend_coins(&mut self, amount: i32) -> bool {
        self.try_spend_coins(amount).is_ok()
    }

    pub fn try_spend_coins(&mut self, amount: i32) -> Result<(), TransactionError> {
        self.check_coins(amount)?;
        self.state.coins -= amount;
        Ok(())
    }

    /// Buy a premium item at the price the caller quotes.
    pub fn purchase_premium_item(&mut self, item_id: &str, coin_cost: i32) -> bool {
        self.try_purchase_premium_item(item_id, coin_cost).is_ok()
    }

    pub fn try_purchase_premium_item(
        &mut self,
        item_id: &str,
        coin_cost: i32,
    ) -> Result<(), TransactionError> {
        self.check_coins(coin_cost)?;
        if self.premium.is_permanently_owned(item_id) {
            return Err(TransactionError::AlreadyOwned(item_id.to_string()));
        }
        let now = self.now_ms();
        if !self.premium.purchase(item_id, now) {
            return Err(TransactionError::UnknownPremiumItem(item_id.to_string()));
        }
        self.state.coins -= coin_cost;
        debug!(item = item_id, coin_cost, "premium item purchased");
        Ok(())
    }

    /// Buy a premium item at its catalog price.
    pub fn purchase_catalog_item(&mut self, item_id: &str) -> bool {
        self.try_purchase_catalog_item(item_id).is_ok()
    }

    pub fn try_purchase_catalog_item(&mut self, item_id: &str) -> Result<(), TransactionError> {
        let item = find_premium_item(item_id)
            .ok_or_else(|| TransactionError::UnknownPremiumItem(item_id.to_string()))?;
        self.try_purchase_premium_item(item.id, item.coin_cost)
    }

    /// Convert coins to cash at the amounts the caller quotes.
    pub fn exchange_coins_for_cash(&mut self, coins: i32, cash_amount: i64) -> bool {
        self.try_exchange_coins_for_cash(coins, cash_amount).is_ok()
    }

    pub fn try_exchange_coins_for_cash(
        &mut self,
        coins: i32,
        cash_amount: i64,
    ) -> Result<(), TransactionError> {
        if cash_amount < 0 {
            return Err(TransactionError::InvalidAmount(cash_amount));
        }
        self.check_coins(coins)?;
        self.state.coins -= coins;
        self.state.credit(cash_amount);
        debug!(coins, cash_amount, "coins exchanged");
        Ok(())
    }

    /// Exchange using the catalog option at `index`.
    pub fn exchange_option(&mut self, index: usize) -> bool {
        self.try_exchange_option(index).is_ok()
    }

    pub fn try_exchange_option(&mut self, index: usize) -> Result<(), TransactionError> {
        let option = EXCHANGE_OPTIONS
            .get(index)
            .ok_or(TransactionError::UnknownExchangeOption(index))?;
        self.try_exchange_coins_for_cash(option.coins_required, option.cash_received)
    }

    /// Credit the coins of a successful payment. Returns the coins added.
    pub fn apply_payment(&mut self, outcome: &PaymentOutcome) -> Result<i32, TransactionError> {
        let PaymentOutcome::Success { package_id, transaction_id } = outcome else {
            return Ok(0);
        };
        let package = find_coin_package(package_id)
            .ok_or_else(|| TransactionError::UnknownCoinPackage(package_id.clone()))?;
        let coins = package.total_coins();
        self.add_coins(coins);
        info!(package = package.id, transaction_id = %transaction_id, coins, "coin package credited");
        Ok(coins)
    }

    /// 表示層が 1 フレーム描くのに必要なものをまとめたコピー。
    pub fn snapshot(&mut self) -> EngineSnapshot {
        let production_rate = self.production_rate();
        let click_value = self.click_value();
        let now = self.now_ms();
        let active_boosts = self.premium.active_boost_summaries(now);
        let auto_collect = self.premium.has_auto_collect(now);
        let cash = self.state.cash;
        EngineSnapshot {
            state: self.state.clone(),
            production_rate,
            click_value,
            tools: self
                .tools
                .iter()
                .map(|t| ToolView {
                    id: t.id(),
                    name: t.def.name,
                    owned: t.owned,
                    cost: t.cost(),
                    production: t.production(),
                    affordable: cash >= t.cost(),
                })
                .collect(),
            owned_items: self.premium.owned_items().iter().cloned().collect(),
            active_boosts,
            auto_collect,
        }
    }

    fn check_coins(&self, amount: i32) -> Result<(), TransactionError> {
        if amount < 0 {
            return Err(TransactionError::InvalidAmount(amount as i64));
        }
        if self.state.coins < amount {
            return Err(TransactionError::InsufficientCoins {
                needed: amount,
                available: self.state.coins,
            });
        }
        Ok(())
    }
}

/// Truncate a non-negative amount of cash, saturating at i64::MAX.
fn to_cash(amount: f64) -> i64 {
    if amount.is_nan() || amount <= 0.0 {
        0
    } else if amount >= i64::MAX as f64 {
        i64::MAX
    } else {
        amount as i64
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolView {
    pub id: &'static str,
    pub name: &'static str,
    pub owned: u32,
    pub cost: i64,
    pub production: f64,
    pub affordable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub state: GameState,
    pub production_rate: f64,
    pub click_value: i64,
    pub tools: Vec<ToolView>,
    pub owned_items: Vec<String>,
    pub active_boosts: Vec<BoostSummary>,
    pub auto_collect: bool,
}
