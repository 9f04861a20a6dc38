//! 永続化ゲートウェイ: [`GameState`] とプレミアムデータを [`KeyValueStore`] に対応付ける。
//!
//! キー構成:
//!
//! - `cash`, `total_earned`, `last_save_time` (long), `coins` (int)
//! - `automation_tool_keys` (ツール ID の文字列セット) と ID ごとの `tool_<id>` (int)
//! - `premium_owned_items` (文字列セット)
//! - `active_boosts_count` (int) とブーストごとの `boost_<i>_id`, `boost_<i>_type`,
//!   `boost_<i>_value` (float), `boost_<i>_end` (long)
//!
//! セーブのたびに全キーを書き直す。型が合わないスカラー値はデフォルトとして読み込み、
//! 読めないブーストはそのレコードだけ読み飛ばす。

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::state::{ActiveBoost, GameState, PremiumItemType};
use crate::error::StoreError;
use crate::store::KeyValueStore;

const KEY_CASH: &str = "cash";
const KEY_COINS: &str = "coins";
const KEY_TOTAL_EARNED: &str = "total_earned";
const KEY_LAST_SAVE_TIME: &str = "last_save_time";
const KEY_TOOL_IDS: &str = "automation_tool_keys";
const KEY_OWNED_ITEMS: &str = "premium_owned_items";
const KEY_BOOST_COUNT: &str = "active_boosts_count";

fn tool_key(id: &str) -> String {
    format!("tool_{id}")
}

fn boost_key(index: i32, field: &str) -> String {
    format!("boost_{index}_{field}")
}

/// 型付き読み出しを展開する。型の不一致はログに残して捨てる。
fn lenient<T>(read: Result<Option<T>, StoreError>) -> Option<T> {
    match read {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable save field");
            None
        }
    }
}

pub struct GameRepository<S> {
    store: S,
}

impl<S: KeyValueStore> GameRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// 保存された状態を読む。無いフィールドはデフォルト値、保存時刻が無ければ `now_ms`。
    pub fn load_game_state(&self, now_ms: i64) -> GameState {
        let mut state = GameState::new(now_ms);
        state.cash = lenient(self.store.get_i64(KEY_CASH)).unwrap_or(0);
        state.coins = lenient(self.store.get_i32(KEY_COINS)).unwrap_or(0);
        state.total_earned = lenient(self.store.get_i64(KEY_TOTAL_EARNED)).unwrap_or(0);
        state.last_save_time = lenient(self.store.get_i64(KEY_LAST_SAVE_TIME)).unwrap_or(now_ms);

        for id in lenient(self.store.get_string_set(KEY_TOOL_IDS)).unwrap_or_default() {
            let owned = lenient(self.store.get_i32(&tool_key(&id))).unwrap_or(0);
            if owned > 0 {
                state.automation_tools.insert(id, owned as u32);
            }
        }
        state
    }

    /// 状態を上書き保存し、保存時刻を `now_ms` にする。
    pub fn save_game_state(&mut self, state: &GameState, now_ms: i64) {
        let previous = lenient(self.store.get_string_set(KEY_TOOL_IDS)).unwrap_or_default();
        for stale in previous.iter().filter(|id| !state.automation_tools.contains_key(*id)) {
            self.store.remove(&tool_key(stale));
        }

        self.store.put_i64(KEY_CASH, state.cash);
        self.store.put_i32(KEY_COINS, state.coins);
        self.store.put_i64(KEY_TOTAL_EARNED, state.total_earned);
        self.store.put_i64(KEY_LAST_SAVE_TIME, now_ms);
        for (id, owned) in &state.automation_tools {
            let owned = i32::try_from(*owned).unwrap_or(i32::MAX);
            self.store.put_i32(&tool_key(id), owned);
        }
        self.store
            .put_string_set(KEY_TOOL_IDS, state.automation_tools.keys().cloned().collect());
    }

    /// 最後のセーブからの経過ミリ秒。セーブが無ければ 0。
    pub fn offline_time(&self, now_ms: i64) -> i64 {
        match lenient(self.store.get_i64(KEY_LAST_SAVE_TIME)) {
            Some(saved) => now_ms - saved,
            None => 0,
        }
    }

    pub fn save_premium_data(&mut self, owned_items: &BTreeSet<String>, boosts: &[ActiveBoost]) {
        let previous = lenient(self.store.get_i32(KEY_BOOST_COUNT)).unwrap_or(0);
        let count = i32::try_from(boosts.len()).unwrap_or(i32::MAX);

        self.store.put_string_set(KEY_OWNED_ITEMS, owned_items.clone());
        self.store.put_i32(KEY_BOOST_COUNT, count);
        for (index, boost) in (0..count).zip(boosts) {
            self.store.put_string(&boost_key(index, "id"), &boost.item_id);
            self.store.put_string(&boost_key(index, "type"), boost.kind.as_str());
            self.store.put_f32(&boost_key(index, "value"), boost.effect_value as f32);
            self.store.put_i64(&boost_key(index, "end"), boost.end_time);
        }
        for index in count..previous {
            for field in ["id", "type", "value", "end"] {
                self.store.remove(&boost_key(index, field));
            }
        }
    }

    /// プレミアムデータを読む。読めないもの、種別が不明なもの、`now_ms` で期限切れのブーストは捨てる。
    pub fn load_premium_data(&self, now_ms: i64) -> (BTreeSet<String>, Vec<ActiveBoost>) {
        let owned = lenient(self.store.get_string_set(KEY_OWNED_ITEMS)).unwrap_or_default();
        let count = lenient(self.store.get_i32(KEY_BOOST_COUNT)).unwrap_or(0);

        let mut boosts = Vec::new();
        for index in 0..count {
            match self.read_boost(index) {
                Some(boost) if boost.is_expired(now_ms) => {
                    debug!(index, item = %boost.item_id, "dropping expired boost");
                }
                Some(boost) => boosts.push(boost),
                None => warn!(index, "skipping unreadable boost record"),
            }
        }
        (owned, boosts)
    }

    fn read_boost(&self, index: i32) -> Option<ActiveBoost> {
        let item_id = lenient(self.store.get_string(&boost_key(index, "id")))
            .filter(|id| !id.is_empty())?;
        let type_name = lenient(self.store.get_string(&boost_key(index, "type")))?;
        let kind = type_name.parse::<PremiumItemType>().ok()?;
        let effect_value = lenient(self.store.get_f32(&boost_key(index, "value")))?;
        let end_time = lenient(self.store.get_i64(&boost_key(index, "end")))?;
        Some(ActiveBoost {
            item_id,
            kind,
            effect_value: effect_value as f64,
            end_time,
        })
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.store.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const T0: i64 = 1_700_000_000_000;
    const MINUTE: i64 = 60_000;

    fn repo() -> GameRepository<MemoryStore> {
        GameRepository::new(MemoryStore::new())
    }

    fn boost(item_id: &str, kind: PremiumItemType, effect_value: f64, end_time: i64) -> ActiveBoost {
        ActiveBoost {
            item_id: item_id.into(),
            kind,
            effect_value,
            end_time,
        }
    }

    #[test]
    fn empty_store_loads_fresh_state() {
        let r = repo();
        let state = r.load_game_state(T0);
        assert_eq!(state, GameState::new(T0));
        assert_eq!(r.offline_time(T0 + MINUTE), 0);
    }

    #[test]
    fn game_state_roundtrip_stamps_save_time() {
        let mut r = repo();
        let mut state = GameState::new(T0 - 10 * MINUTE);
        state.cash = 5_000_000_000;
        state.coins = 42;
        state.total_earned = 9_000_000_000;
        state.automation_tools.insert("basic_printer".into(), 12);
        state.automation_tools.insert("money_press".into(), 1);
        r.save_game_state(&state, T0);

        let loaded = r.load_game_state(T0 + 5 * MINUTE);
        assert_eq!(loaded.cash, state.cash);
        assert_eq!(loaded.coins, 42);
        assert_eq!(loaded.total_earned, state.total_earned);
        assert_eq!(loaded.automation_tools, state.automation_tools);
        assert_eq!(loaded.last_save_time, T0);
        assert_eq!(r.offline_time(T0 + 5 * MINUTE), 5 * MINUTE);
    }

    #[test]
    fn save_is_full_overwrite() {
        let mut r = repo();
        let mut state = GameState::new(T0);
        state.automation_tools.insert("basic_printer".into(), 3);
        state.automation_tools.insert("money_press".into(), 2);
        r.save_game_state(&state, T0);

        state.automation_tools.remove("money_press");
        r.save_game_state(&state, T0 + 1);
        assert!(r.store().get("tool_money_press").is_none());
        assert_eq!(r.load_game_state(T0).automation_tools.len(), 1);
    }

    #[test]
    fn mistyped_scalar_loads_as_default() {
        let mut store = MemoryStore::new();
        store.put_string("cash", "lots");
        store.put_i32("coins", 9);
        let r = GameRepository::new(store);
        let state = r.load_game_state(T0);
        assert_eq!(state.cash, 0);
        assert_eq!(state.coins, 9);
    }

    #[test]
    fn premium_roundtrip() {
        let mut r = repo();
        let owned: BTreeSet<String> = ["super_printer".to_string()].into_iter().collect();
        let boosts = vec![
            boost("mega_boost", PremiumItemType::TemporaryMegaBoost, 10.0, T0 + 30 * MINUTE),
            boost("money_magnet", PremiumItemType::TemporaryAutoCollect, 0.05, T0 + 60 * MINUTE),
        ];
        r.save_premium_data(&owned, &boosts);

        let (loaded_owned, loaded) = r.load_premium_data(T0);
        assert_eq!(loaded_owned, owned);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].item_id, "mega_boost");
        assert_eq!(loaded[0].kind, PremiumItemType::TemporaryMegaBoost);
        assert_eq!(loaded[0].effect_value, 10.0);
        assert_eq!(loaded[0].end_time, T0 + 30 * MINUTE);
        assert!((loaded[1].effect_value - 0.05).abs() < 1e-6);
    }

    #[test]
    fn expired_and_unknown_boosts_are_dropped() {
        let mut store = MemoryStore::new();
        store.put_i32("active_boosts_count", 4);
        let records = [
            ("mega_boost", "TEMPORARY_MEGA_BOOST", T0 - 1),
            ("mystery", "TEMPORARY_TIME_WARP", T0 + MINUTE),
            ("", "TEMPORARY_MEGA_BOOST", T0 + MINUTE),
            ("time_accelerator", "TEMPORARY_PRODUCTION_BOOST", T0 + MINUTE),
        ];
        for (i, (id, kind, end)) in records.iter().enumerate() {
            let i = i as i32;
            store.put_string(&boost_key(i, "id"), id);
            store.put_string(&boost_key(i, "type"), kind);
            store.put_f32(&boost_key(i, "value"), 3.0);
            store.put_i64(&boost_key(i, "end"), *end);
        }
        let r = GameRepository::new(store);
        let (_, boosts) = r.load_premium_data(T0);
        assert_eq!(boosts.len(), 1);
        assert_eq!(boosts[0].item_id, "time_accelerator");
    }

    #[test]
    fn missing_boost_field_skips_only_that_record() {
        let mut r = repo();
        let boosts = vec![
            boost("mega_boost", PremiumItemType::TemporaryMegaBoost, 10.0, T0 + MINUTE),
            boost("time_accelerator", PremiumItemType::TemporaryProductionBoost, 3.0, T0 + MINUTE),
        ];
        r.save_premium_data(&BTreeSet::new(), &boosts);
        let mut store = r.into_inner();
        store.remove("boost_0_end");
        let r = GameRepository::new(store);
        let (_, loaded) = r.load_premium_data(T0);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].item_id, "time_accelerator");
    }

    #[test]
    fn fewer_boosts_remove_stale_records() {
        let mut r = repo();
        let boosts = vec![
            boost("mega_boost", PremiumItemType::TemporaryMegaBoost, 10.0, T0 + MINUTE),
            boost("time_accelerator", PremiumItemType::TemporaryProductionBoost, 3.0, T0 + MINUTE),
        ];
        r.save_premium_data(&BTreeSet::new(), &boosts);
        r.save_premium_data(&BTreeSet::new(), &boosts[..1]);
        assert!(r.store().get("boost_1_id").is_none());
        assert_eq!(r.load_premium_data(T0).1.len(), 1);
    }
}
