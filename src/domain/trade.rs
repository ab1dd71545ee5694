//! Open-position state.

use crate::domain::backtest::{Direction, TradeRecord};
use crate::domain::exits::ExitReason;
use chrono::NaiveDateTime;

/// A position between its entry and exit bars. Water marks ratchet with
/// favorable price movement and drive the trailing stop.
#[derive(Debug, Clone)]
pub struct OpenTrade {
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub qty: u32,
    pub entry_index: usize,
    pub high_water_mark: f64,
    pub low_water_mark: f64,
    /// Current trailing-stop level; 0 when no trailing stop is armed.
    pub active_tsl: f64,
}

impl OpenTrade {
    pub fn new(
        entry_time: NaiveDateTime,
        entry_price: f64,
        qty: u32,
        direction: Direction,
        entry_index: usize,
    ) -> Self {
        OpenTrade {
            direction,
            entry_time,
            entry_price,
            qty,
            entry_index,
            high_water_mark: entry_price,
            low_water_mark: entry_price,
            active_tsl: 0.0,
        }
    }

    /// Bars elapsed since the entry bar.
    pub fn bars_held(&self, bar_index: usize) -> usize {
        bar_index.saturating_sub(self.entry_index)
    }

    pub fn close(self, exit_time: NaiveDateTime, exit_price: f64, reason: ExitReason) -> TradeRecord {
        let qty = f64::from(self.qty);
        let pnl = match self.direction {
            Direction::Long => (exit_price - self.entry_price) * qty,
            Direction::Short => (self.entry_price - exit_price) * qty,
        };
        TradeRecord {
            direction: self.direction,
            entry_time: self.entry_time,
            entry_price: self.entry_price,
            exit_time,
            exit_price,
            exit_reason: reason.to_string(),
            qty: self.qty,
            pnl,
            holding_bars: (exit_time - self.entry_time).num_minutes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(min: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
            + chrono::Duration::minutes(min)
    }

    #[test]
    fn water_marks_start_at_entry() {
        let trade = OpenTrade::new(at(0), 100.0, 1, Direction::Long, 0);
        assert_eq!(trade.high_water_mark, 100.0);
        assert_eq!(trade.low_water_mark, 100.0);
    }

    #[test]
    fn long_pnl() {
        let trade = OpenTrade::new(at(0), 100.0, 3, Direction::Long, 0);
        let record = trade.close(at(10), 110.0, ExitReason::TakeProfit);
        assert!((record.pnl - 30.0).abs() < f64::EPSILON);
        assert_eq!(record.exit_reason, "TakeProfit");
    }

    #[test]
    fn short_pnl() {
        let trade = OpenTrade::new(at(0), 100.0, 2, Direction::Short, 0);
        let record = trade.close(at(10), 90.0, ExitReason::ExitCondition);
        assert!((record.pnl - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn holding_bars_field_records_minutes() {
        let trade = OpenTrade::new(at(0), 100.0, 1, Direction::Long, 4);
        let record = trade.close(at(25), 101.0, ExitReason::EndOfBacktest);
        assert_eq!(record.holding_bars, 25);
    }

    #[test]
    fn bars_held_counts_from_entry_index() {
        let trade = OpenTrade::new(at(0), 100.0, 1, Direction::Long, 7);
        assert_eq!(trade.bars_held(7), 0);
        assert_eq!(trade.bars_held(12), 5);
    }
}
