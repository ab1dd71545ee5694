//! Exit-rule evaluation for the trade loop.
//!
//! Per-bar ordering: trailing stop (update, then check), fixed stop-loss,
//! take-profit, max holding period. The exit-signal and intraday-window
//! checks live in the simulator loop after these, so the first rule that
//! fires wins and at most one exit happens per bar.

use crate::domain::backtest::{Direction, IntradayRule};
use crate::domain::trade::OpenTrade;
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TrailingStop,
    StopLoss,
    TakeProfit,
    MaxHoldingPeriod,
    ExitCondition,
    IntradayExit,
    EndOfBacktest,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitReason::TrailingStop => "TrailingStop",
            ExitReason::StopLoss => "StopLoss",
            ExitReason::TakeProfit => "TakeProfit",
            ExitReason::MaxHoldingPeriod => "MaxHoldingPeriod",
            ExitReason::ExitCondition => "ExitCondition",
            ExitReason::IntradayExit => "IntradayExit",
            ExitReason::EndOfBacktest => "EndOfBacktest",
        })
    }
}

pub struct ExitChecker<'a> {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub trailing_sl: f64,
    pub holding_bars: Option<usize>,
    pub intraday: Option<&'a IntradayRule>,
}

impl ExitChecker<'_> {
    /// Price/risk/time exits, in order. Mutates the trade's water marks and
    /// trailing level before checking them.
    pub fn check_exit(
        &self,
        trade: &mut OpenTrade,
        price: f64,
        bar_index: usize,
    ) -> Option<ExitReason> {
        if self.trailing_sl > 0.0 {
            match trade.direction {
                Direction::Long => {
                    if price > trade.high_water_mark || trade.active_tsl == 0.0 {
                        trade.high_water_mark = trade.high_water_mark.max(price);
                        trade.active_tsl = trade.high_water_mark * (1.0 - self.trailing_sl / 100.0);
                    }
                    if price <= trade.active_tsl {
                        return Some(ExitReason::TrailingStop);
                    }
                }
                Direction::Short => {
                    if price < trade.low_water_mark || trade.active_tsl == 0.0 {
                        trade.low_water_mark = trade.low_water_mark.min(price);
                        trade.active_tsl = trade.low_water_mark * (1.0 + self.trailing_sl / 100.0);
                    }
                    if price >= trade.active_tsl {
                        return Some(ExitReason::TrailingStop);
                    }
                }
            }
        }

        if self.stop_loss > 0.0 {
            let hit = match trade.direction {
                Direction::Long => price <= trade.entry_price * (1.0 - self.stop_loss / 100.0),
                Direction::Short => price >= trade.entry_price * (1.0 + self.stop_loss / 100.0),
            };
            if hit {
                return Some(ExitReason::StopLoss);
            }
        }

        if self.take_profit > 0.0 {
            let hit = match trade.direction {
                Direction::Long => price >= trade.entry_price * (1.0 + self.take_profit / 100.0),
                Direction::Short => price <= trade.entry_price * (1.0 - self.take_profit / 100.0),
            };
            if hit {
                return Some(ExitReason::TakeProfit);
            }
        }

        if let Some(max_bars) = self.holding_bars {
            if trade.bars_held(bar_index) >= max_bars {
                return Some(ExitReason::MaxHoldingPeriod);
            }
        }

        None
    }

    /// Entry gate: when the intraday rule is active, entries before the
    /// session start time are rejected. Only hours and minutes are compared.
    pub fn allow_entry(&self, bar_time: NaiveDateTime) -> bool {
        let Some(rule) = self.intraday.filter(|r| r.enabled) else {
            return true;
        };
        let Some(start) = rule.start_time.as_deref().and_then(parse_hhmm) else {
            return true;
        };
        hm(bar_time) >= (start.hour(), start.minute())
    }

    /// Session-close exit: fires at and after the configured exit time.
    pub fn check_intraday_exit(&self, bar_time: NaiveDateTime) -> Option<ExitReason> {
        let rule = self.intraday.filter(|r| r.enabled)?;
        let exit = rule.exit_time.as_deref().and_then(parse_hhmm)?;
        if hm(bar_time) >= (exit.hour(), exit.minute()) {
            Some(ExitReason::IntradayExit)
        } else {
            None
        }
    }
}

fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

fn hm(t: NaiveDateTime) -> (u32, u32) {
    (t.hour(), t.minute())
}
