//! Bar-by-bar trade loop.
//!
//! Entries are edge-triggered: a new trade needs a false-to-true transition
//! of the entry series (bar 0 counts as an edge when true). An edge blocked
//! by the session-start gate stays pending while the signal holds; edges
//! occurring while a trade is open are ignored. Entries fill at the bar
//! close.
//!
//! While a trade is open, each bar runs the exit ladder: price/risk/time
//! rules first, then the user exit signal, then the intraday session close;
//! the first hit wins. At most one trade is open at any bar, and a trade
//! still open when data ends is closed at the final bar close with reason
//! `EndOfBacktest`. The equity curve records capital after each bar's events
//! and always matches the candle count.

use crate::domain::backtest::{Direction, TradeRecord};
use crate::domain::candle::Candle;
use crate::domain::exits::{ExitChecker, ExitReason};
use crate::domain::trade::OpenTrade;

#[derive(Debug, Default)]
pub struct SimulationOutcome {
    pub trades: Vec<TradeRecord>,
    pub equity: Vec<f64>,
    /// Bar indices where trades were opened / closed.
    pub entries: Vec<usize>,
    pub exits: Vec<usize>,
}

#[allow(clippy::too_many_arguments)]
pub fn run_simulation(
    candles: &[Candle],
    entry_signal: &[bool],
    exit_signal: Option<&[bool]>,
    direction: Direction,
    qty: u32,
    capital: f64,
    checker: &ExitChecker,
) -> SimulationOutcome {
    let mut outcome = SimulationOutcome::default();
    let mut active: Option<OpenTrade> = None;
    let mut capital = capital;
    let mut armed = false;

    for (i, bar) in candles.iter().enumerate() {
        let price = bar.close;

        if let Some(mut trade) = active.take() {
            let mut reason = checker.check_exit(&mut trade, price, i);
            if reason.is_none() && exit_signal.is_some_and(|s| i < s.len() && s[i]) {
                reason = Some(ExitReason::ExitCondition);
            }
            if reason.is_none() {
                reason = checker.check_intraday_exit(bar.time);
            }
            match reason {
                Some(reason) => {
                    let record = trade.close(bar.time, price, reason);
                    capital += record.pnl;
                    outcome.trades.push(record);
                    outcome.exits.push(i);
                }
                None => active = Some(trade),
            }
        }

        let signal = entry_signal.get(i).copied().unwrap_or(false);
        if active.is_none() {
            let rising_edge =
                signal && (i == 0 || !entry_signal.get(i - 1).copied().unwrap_or(false));
            if rising_edge {
                armed = true;
            } else if !signal {
                armed = false;
            }
        } else {
            armed = false;
        }

        if active.is_none() && armed && checker.allow_entry(bar.time) {
            active = Some(OpenTrade::new(bar.time, price, qty, direction, i));
            outcome.entries.push(i);
            armed = false;
        }

        outcome.equity.push(capital);
    }

    if let Some(trade) = active.take() {
        if let Some(last) = candles.last() {
            let record = trade.close(last.time, last.close, ExitReason::EndOfBacktest);
            capital += record.pnl;
            outcome.trades.push(record);
            outcome.exits.push(candles.len() - 1);
            if let Some(eq) = outcome.equity.last_mut() {
                *eq = capital;
            }
        }
    }

    tracing::debug!(
        bars = candles.len(),
        trades = outcome.trades.len(),
        final_equity = capital,
        "simulation finished"
    );
    outcome
}
