//! Aggregate statistics over the trade log and equity curve.

use crate::domain::backtest::TradeRecord;
use crate::domain::metrics;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BacktestSummary {
    // profitability
    pub total_trades: usize,
    pub net_profit: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,

    // risk-adjusted
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub omega_ratio: f64,

    // drawdown
    pub max_drawdown: f64,
    pub avg_drawdown: f64,
    pub recovery_factor: f64,
    pub ulcer_index: f64,

    // trade quality
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub risk_reward_ratio: f64,
    pub max_consec_wins: usize,
    pub max_consec_losses: usize,

    // capital growth
    pub cagr: f64,
    pub equity_volatility: f64,
    pub skewness: f64,
    pub kurtosis: f64,

    // exposure
    pub avg_hold_bars: f64,
    pub exposure_ratio: f64,
    pub turnover_ratio: f64,

    pub trades: Vec<TradeRecord>,
}

pub fn compute_summary(
    trades: Vec<TradeRecord>,
    equity: &[f64],
    start_equity: f64,
) -> BacktestSummary {
    if equity.is_empty() {
        return BacktestSummary::default();
    }

    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;
    let mut wins = 0usize;
    let mut losses = 0usize;
    let mut consec_wins = 0usize;
    let mut consec_losses = 0usize;
    let mut max_consec_wins = 0usize;
    let mut max_consec_losses = 0usize;
    let mut total_hold_bars = 0i64;

    let mut returns = Vec::with_capacity(equity.len().saturating_sub(1));
    for window in equity.windows(2) {
        let prev = window[0];
        returns.push(if prev == 0.0 {
            0.0
        } else {
            (window[1] - prev) / prev
        });
    }

    for trade in &trades {
        if trade.pnl > 0.0 {
            gross_profit += trade.pnl;
            wins += 1;
            consec_wins += 1;
            max_consec_wins = max_consec_wins.max(consec_wins);
            consec_losses = 0;
        } else if trade.pnl < 0.0 {
            gross_loss += trade.pnl;
            losses += 1;
            consec_losses += 1;
            max_consec_losses = max_consec_losses.max(consec_losses);
            consec_wins = 0;
        } else {
            // breakeven trades break both streaks
            consec_wins = 0;
            consec_losses = 0;
        }
        total_hold_bars += trade.holding_bars;
    }

    let final_equity = equity[equity.len() - 1];
    let net_profit = final_equity - start_equity;

    let profit_factor = if gross_loss != 0.0 {
        gross_profit / gross_loss.abs()
    } else {
        0.0
    };
    let expectancy = if trades.is_empty() {
        0.0
    } else {
        net_profit / trades.len() as f64
    };

    let sharpe_ratio = metrics::sharpe(&returns, 0.0);
    let sortino_ratio = metrics::sortino(&returns, 0.0);
    let (max_drawdown, avg_drawdown, ulcer_index) = metrics::drawdowns(equity);
    let years = duration_years(&trades);
    let cagr = metrics::cagr(start_equity, final_equity, years);
    let calmar_ratio = metrics::calmar(cagr, max_drawdown);
    let omega_ratio = metrics::omega(&returns, 0.0);

    let win_rate = if trades.is_empty() {
        0.0
    } else {
        wins as f64 / trades.len() as f64
    };
    let avg_win = if wins > 0 {
        gross_profit / wins as f64
    } else {
        0.0
    };
    let avg_loss = if losses > 0 {
        gross_loss / losses as f64
    } else {
        0.0
    };
    let risk_reward_ratio = if avg_loss != 0.0 {
        avg_win / avg_loss.abs()
    } else {
        0.0
    };

    let recovery_factor = if max_drawdown != 0.0 {
        net_profit / (max_drawdown * start_equity).abs()
    } else {
        0.0
    };

    let avg_hold_bars = if trades.is_empty() {
        0.0
    } else {
        total_hold_bars as f64 / trades.len() as f64
    };
    let exposure_ratio = avg_hold_bars / equity.len() as f64;
    let turnover_ratio = trades.len() as f64 / equity.len() as f64;

    BacktestSummary {
        total_trades: trades.len(),
        net_profit,
        gross_profit,
        gross_loss,
        profit_factor,
        expectancy,
        sharpe_ratio,
        sortino_ratio,
        calmar_ratio,
        omega_ratio,
        max_drawdown,
        avg_drawdown,
        recovery_factor,
        ulcer_index,
        win_rate,
        avg_win,
        avg_loss,
        risk_reward_ratio,
        max_consec_wins,
        max_consec_losses,
        cagr,
        equity_volatility: metrics::std_dev(&returns),
        skewness: metrics::skewness(&returns),
        kurtosis: metrics::kurtosis(&returns),
        avg_hold_bars,
        exposure_ratio,
        turnover_ratio,
        trades,
    }
}

/// Calendar years between the first entry and the last exit; 1.0 when there
/// are no trades.
fn duration_years(trades: &[TradeRecord]) -> f64 {
    let (Some(first), Some(last)) = (trades.first(), trades.last()) else {
        return 1.0;
    };
    let days = (last.exit_time - first.entry_time).num_seconds() as f64 / 86_400.0;
    days / 365.0
}
