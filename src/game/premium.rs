//! プレミアム効果: 永続アイテムと時間制ブースト。
//!
//! 問い合わせはすべて現在時刻 (エポックミリ秒) を受け取り、先に期限切れブーストを取り除く。
//! 期限切れの判定は遅延評価なので、正しさのためのタイマーは要らない。
//! 定期的な掃除は表示用にブースト一覧を整理するだけ。

use std::collections::BTreeSet;

use tracing::debug;

use super::catalog::{find_premium_item, PremiumItem};
use super::state::{ActiveBoost, BoostSummary, PremiumItemType};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PremiumEffectManager {
    owned_items: BTreeSet<String>,
    /// 時間制アイテムの種別ごとに最大 1 つ。
    active_boosts: Vec<ActiveBoost>,
}

impl PremiumEffectManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// プレミアムアイテムを適用する。false を返すのは未知の ID のときだけ。
    ///
    /// 永続アイテムは所持セットに入れる (再度入れても変化なし)。
    /// 時間制アイテムは同じ種別のブーストを置き換え、`now_ms` から計り直す。
    pub fn purchase(&mut self, item_id: &str, now_ms: i64) -> bool {
        let Some(item) = find_premium_item(item_id) else {
            return false;
        };
        self.apply(item, now_ms);
        true
    }

    fn apply(&mut self, item: &PremiumItem, now_ms: i64) {
        if item.is_permanent() {
            self.owned_items.insert(item.id.to_string());
            return;
        }
        let boost = ActiveBoost {
            item_id: item.id.to_string(),
            kind: item.kind,
            effect_value: item.effect_value,
            end_time: now_ms.saturating_add(item.duration_ms()),
        };
        self.active_boosts.retain(|b| b.kind != item.kind);
        debug!(item = item.id, end_time = boost.end_time, "boost activated");
        self.active_boosts.push(boost);
    }

    /// 終了時刻を過ぎたブーストをすべて捨てる。取り除いた数を返す。
    pub fn prune_expired_boosts(&mut self, now_ms: i64) -> usize {
        let before = self.active_boosts.len();
        self.active_boosts.retain(|b| !b.is_expired(now_ms));
        let removed = before - self.active_boosts.len();
        if removed > 0 {
            debug!(removed, "expired boosts pruned");
        }
        removed
    }

    /// 自動生産に掛かる効果の積。
    pub fn automation_multiplier(&mut self, now_ms: i64) -> f64 {
        self.prune_expired_boosts(now_ms);
        let permanent: f64 = self
            .owned_permanent_items()
            .filter(|item| item.kind == PremiumItemType::PermanentAutomationMultiplier)
            .map(|item| item.effect_value)
            .product();
        let temporary: f64 = self
            .active_boosts
            .iter()
            .map(|b| match b.kind {
                PremiumItemType::TemporaryProductionBoost | PremiumItemType::TemporaryMegaBoost => {
                    b.effect_value
                }
                _ => 1.0,
            })
            .product();
        permanent * temporary
    }

    /// 手動クリックに掛かる効果の積。メガブーストは
    /// [`Self::automation_multiplier`] と両方に効く。
    pub fn click_multiplier(&mut self, now_ms: i64) -> f64 {
        self.prune_expired_boosts(now_ms);
        let permanent: f64 = self
            .owned_permanent_items()
            .filter(|item| item.kind == PremiumItemType::PermanentClickMultiplier)
            .map(|item| item.effect_value)
            .product();
        let temporary: f64 = self
            .active_boosts
            .iter()
            .map(|b| match b.kind {
                PremiumItemType::TemporaryMegaBoost => b.effect_value,
                _ => 1.0,
            })
            .product();
        permanent * temporary
    }

    pub fn has_auto_collect(&mut self, now_ms: i64) -> bool {
        self.auto_collect_rate(now_ms) > 0.0
    }

    /// Effect value of the active auto-collect boost, 0.0 when none.
    pub fn auto_collect_rate(&mut self, now_ms: i64) -> f64 {
        self.prune_expired_boosts(now_ms);
        self.active_boosts
            .iter()
            .find(|b| b.kind == PremiumItemType::TemporaryAutoCollect)
            .map_or(0.0, |b| b.effect_value)
    }

    /// 所持セットにある永続アイテムのときだけ true。時間制アイテムは何度でも買える。
    pub fn is_permanently_owned(&self, item_id: &str) -> bool {
        match find_premium_item(item_id) {
            Some(item) if item.is_permanent() => self.owned_items.contains(item_id),
            _ => false,
        }
    }

    pub fn active_boost_summaries(&mut self, now_ms: i64) -> Vec<BoostSummary> {
        self.prune_expired_boosts(now_ms);
        self.active_boosts
            .iter()
            .map(|b| BoostSummary {
                name: find_premium_item(&b.item_id)
                    .map_or_else(|| "Unknown".to_string(), |item| item.name.to_string()),
                remaining_ms: b.remaining_ms(now_ms),
            })
            .collect()
    }

    pub fn owned_items(&self) -> &BTreeSet<String> {
        &self.owned_items
    }

    pub fn active_boosts(&self) -> &[ActiveBoost] {
        &self.active_boosts
    }

    /// 保存用の所持セットと有効なブースト。
    pub fn export_state(&mut self, now_ms: i64) -> (BTreeSet<String>, Vec<ActiveBoost>) {
        self.prune_expired_boosts(now_ms);
        (self.owned_items.clone(), self.active_boosts.clone())
    }

    /// 所持セットとブーストを保存データで置き換える。
    /// `now_ms` の時点で期限切れのものは捨てる。同じ種別が複数あれば購入時と同じく最後のものが残る。
    pub fn import_state(
        &mut self,
        owned_items: BTreeSet<String>,
        active_boosts: Vec<ActiveBoost>,
        now_ms: i64,
    ) {
        self.owned_items = owned_items;
        self.active_boosts.clear();
        for boost in active_boosts {
            if boost.is_expired(now_ms) {
                continue;
            }
            self.active_boosts.retain(|b| b.kind != boost.kind);
            self.active_boosts.push(boost);
        }
    }

    fn owned_permanent_items(&self) -> impl Iterator<Item = &'static PremiumItem> + '_ {
        self.owned_items
            .iter()
            .filter_map(|id| find_premium_item(id))
            .filter(|item| item.is_permanent())
    }
}
