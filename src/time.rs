//! 固定タイムステップの経済クロック。
//!
//! 経済タスクはほぼ tick 間隔ごとに起きるが、タイマーはずれるしホストが止まることもある。
//! `TickClock` は起床間の実経過時間を整数個の tick に変換し、余りを持ち越す。
//! これにより加算される tick 数が実時間に追従する。

/// 1 回の更新で扱う最大の経過時間。これより長い分はオフライン収益で扱う。
pub const DEFAULT_MAX_DELTA_MS: i64 = 1_000;

#[derive(Clone, Debug)]
pub struct TickClock {
    ms_per_tick: f64,
    max_delta_ms: i64,
    /// まだ tick に変換していないミリ秒。
    accumulator: f64,
    pub total_ticks: u64,
    /// 前回更新時のエポックミリ秒。初回前は None。
    last_ms: Option<i64>,
}

impl TickClock {
    pub fn new(ticks_per_second: u32) -> Self {
        Self::with_max_delta(ticks_per_second, DEFAULT_MAX_DELTA_MS)
    }

    pub fn with_max_delta(ticks_per_second: u32, max_delta_ms: i64) -> Self {
        Self {
            ms_per_tick: 1000.0 / ticks_per_second.max(1) as f64,
            max_delta_ms: max_delta_ms.max(0),
            accumulator: 0.0,
            total_ticks: 0,
            last_ms: None,
        }
    }

    /// Feed the current time; returns how many ticks to run now.
    ///
    /// The first call only records the timestamp. A clock that goes backwards
    /// contributes nothing.
    pub fn update(&mut self, now_ms: i64) -> u32 {
        let delta = match self.last_ms {
            Some(prev) => (now_ms - prev).clamp(0, self.max_delta_ms),
            None => 0,
        };
        self.last_ms = Some(now_ms);

        self.accumulator += delta as f64;
        let ticks = (self.accumulator / self.ms_per_tick) as u32;
        self.accumulator -= ticks as f64 * self.ms_per_tick;
        self.total_ticks += ticks as u64;
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn first_update_yields_nothing() {
        let mut clock = TickClock::new(10);
        assert_eq!(clock.update(T0), 0);
    }

    #[test]
    fn one_tick_per_interval() {
        let mut clock = TickClock::new(10);
        clock.update(T0);
        assert_eq!(clock.update(T0 + 100), 1);
        assert_eq!(clock.update(T0 + 200), 1);
        assert_eq!(clock.total_ticks, 2);
    }

    #[test]
    fn late_wakeup_catches_up_and_keeps_remainder() {
        let mut clock = TickClock::new(10);
        clock.update(T0);
        assert_eq!(clock.update(T0 + 350), 3);
        // 50ms carried + 60ms = 110ms
        assert_eq!(clock.update(T0 + 410), 1);
        assert_eq!(clock.total_ticks, 4);
    }

    #[test]
    fn stall_is_clamped() {
        let mut clock = TickClock::new(10);
        clock.update(T0);
        assert_eq!(clock.update(T0 + 60_000), 10);
    }

    #[test]
    fn backwards_clock_adds_no_ticks() {
        let mut clock = TickClock::new(10);
        clock.update(T0);
        assert_eq!(clock.update(T0 - 5_000), 0);
        assert_eq!(clock.update(T0 - 4_900), 1);
    }

    #[test]
    fn steady_wakeups_track_wall_time() {
        let mut clock = TickClock::new(10);
        clock.update(T0);
        let total: u32 = (1..=60).map(|i| clock.update(T0 + i * 17)).sum();
        // 1020ms elapsed
        assert_eq!(total, 10);
    }
}
