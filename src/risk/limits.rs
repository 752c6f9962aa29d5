//! Daily trade and loss limits.
//!
//! Counters reset at UTC midnight. Once a limit is reached new entries are
//! blocked for the rest of the day; exits are never blocked.

use crate::config::LimitsConfig;
use chrono::NaiveDate;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct DailyLimits {
    max_trades_per_day: u32,
    max_losses_per_day: u32,
    day: NaiveDate,
    trades: u32,
    losses: u32,
}

impl DailyLimits {
    pub fn new(config: &LimitsConfig, today: NaiveDate) -> Self {
        Self {
            max_trades_per_day: config.max_trades_per_day,
            max_losses_per_day: config.max_losses_per_day,
            day: today,
            trades: 0,
            losses: 0,
        }
    }

    /// Resume counters persisted for `day`. Stale counters are discarded.
    pub fn restore(
        config: &LimitsConfig,
        day: NaiveDate,
        trades: u32,
        losses: u32,
        today: NaiveDate,
    ) -> Self {
        let mut limits = Self::new(config, day);
        limits.trades = trades;
        limits.losses = losses;
        limits.roll_over(today);
        limits
    }

    /// Reset counters if `today` is a new day. Returns true on reset.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if today == self.day {
            return false;
        }
        info!(
            previous_day = %self.day,
            trades = self.trades,
            losses = self.losses,
            "📅 [LIMITS] New trading day, counters reset"
        );
        self.day = today;
        self.trades = 0;
        self.losses = 0;
        true
    }

    pub fn entries_allowed(&self) -> bool {
        let trades_ok = self.max_trades_per_day == 0 || self.trades < self.max_trades_per_day;
        let losses_ok = self.max_losses_per_day == 0 || self.losses < self.max_losses_per_day;
        trades_ok && losses_ok
    }

    /// Count one entry.
    pub fn record_trade(&mut self) {
        self.trades += 1;
        if self.max_trades_per_day > 0 && self.trades >= self.max_trades_per_day {
            warn!(trades = self.trades, "🚦 [LIMITS] Daily trade limit reached");
        }
    }

    /// Count one losing exit.
    pub fn record_loss(&mut self) {
        self.losses += 1;
        if self.max_losses_per_day > 0 && self.losses >= self.max_losses_per_day {
            warn!(losses = self.losses, "🚦 [LIMITS] Daily loss limit reached");
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn trades(&self) -> u32 {
        self.trades
    }

    pub fn losses(&self) -> u32 {
        self.losses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn limits(trades: u32, losses: u32) -> LimitsConfig {
        LimitsConfig {
            max_trades_per_day: trades,
            max_losses_per_day: losses,
        }
    }

    #[test]
    fn test_zero_means_unlimited() {
        let mut l = DailyLimits::new(&limits(0, 0), day(1));
        for _ in 0..100 {
            l.record_trade();
            l.record_loss();
        }
        assert!(l.entries_allowed());
    }

    #[test]
    fn test_trade_limit_blocks_entries() {
        let mut l = DailyLimits::new(&limits(2, 0), day(1));
        l.record_trade();
        assert!(l.entries_allowed());
        l.record_trade();
        assert!(!l.entries_allowed());
    }

    #[test]
    fn test_loss_limit_blocks_entries() {
        let mut l = DailyLimits::new(&limits(0, 1), day(1));
        l.record_loss();
        assert!(!l.entries_allowed());
    }

    #[test]
    fn test_rollover_resets_counters() {
        let mut l = DailyLimits::new(&limits(1, 1), day(1));
        l.record_trade();
        l.record_loss();

        assert!(!l.roll_over(day(1)));
        assert!(!l.entries_allowed());

        assert!(l.roll_over(day(2)));
        assert!(l.entries_allowed());
        assert_eq!(l.trades(), 0);
        assert_eq!(l.day(), day(2));
    }

    #[test]
    fn test_restore_discards_stale_day() {
        let same = DailyLimits::restore(&limits(3, 0), day(5), 3, 0, day(5));
        assert!(!same.entries_allowed());

        let stale = DailyLimits::restore(&limits(3, 0), day(4), 3, 0, day(5));
        assert!(stale.entries_allowed());
        assert_eq!(stale.day(), day(5));
    }
}
