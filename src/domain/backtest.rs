//! Backtest request/response surface and pipeline orchestration.
//!
//! [`BacktestEngine::run`] wires the stages together: parse the entry and
//! exit token conditions, lower both through one planner (so common
//! subexpressions share plan nodes), execute against the data provider, run
//! the trade simulator and compute the summary.

use crate::domain::error::StratsimError;
use crate::domain::exits::ExitChecker;
use crate::domain::parser::Parser;
use crate::domain::planner::Planner;
use crate::domain::registry::Registry;
use crate::domain::runtime::{EvalCtx, NanPolicy, Runtime};
use crate::domain::simulator::run_simulation;
use crate::domain::summary::{compute_summary, BacktestSummary};
use crate::domain::timeframe::Timeframe;
use crate::domain::token::Condition;
use crate::ports::data_port::DataProvider;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntradayRule {
    pub enabled: bool,
    /// Session start "HH:MM"; entries before it are rejected.
    #[serde(default)]
    pub start_time: Option<String>,
    /// Session close "HH:MM"; open trades exit at or after it.
    #[serde(default)]
    pub exit_time: Option<String>,
    /// Accepted for wire compatibility; the simulator does not consult it.
    #[serde(default)]
    pub re_enter: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacktestRequest {
    pub symbol: String,
    #[serde(rename = "base_timeframe")]
    pub base_tf: Timeframe,
    pub entry_conditions: Condition,
    #[serde(default)]
    pub exit_conditions: Option<Condition>,
    pub direction: Direction,
    pub quantity: u32,
    pub capital: f64,
    /// Stop-loss percentage; 0 disables.
    #[serde(default)]
    pub stop_loss: f64,
    /// Take-profit percentage; 0 disables.
    #[serde(default)]
    pub take_profit: f64,
    /// Trailing-stop percentage; 0 disables.
    #[serde(default)]
    pub trailing_sl: f64,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub intraday: Option<IntradayRule>,
    /// Maximum bars a trade may stay open.
    #[serde(default)]
    pub holding_period: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: String,
    pub qty: u32,
    pub pnl: f64,
    /// Minutes between entry and exit. The name is a wire-contract holdover;
    /// the holding-period exit rule counts actual bars internally.
    pub holding_bars: i64,
}

#[derive(Debug, Serialize)]
pub struct BacktestResponse {
    pub base_timeframe: Timeframe,
    pub symbol: String,
    pub signal: Vec<bool>,
    pub entries: Vec<usize>,
    pub exits: Vec<usize>,
    pub summary: BacktestSummary,
}

pub struct BacktestEngine<'a> {
    provider: &'a dyn DataProvider,
    registry: &'a Registry,
    policy: NanPolicy,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(provider: &'a dyn DataProvider, registry: &'a Registry) -> Self {
        BacktestEngine {
            provider,
            registry,
            policy: NanPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: NanPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn run(&self, req: &BacktestRequest) -> Result<BacktestResponse, StratsimError> {
        if req.quantity == 0 {
            return Err(StratsimError::InvalidRequest {
                reason: "quantity must be at least 1".into(),
            });
        }
        if req.capital <= 0.0 {
            return Err(StratsimError::InvalidRequest {
                reason: "capital must be positive".into(),
            });
        }

        let parser = Parser::new(self.registry);
        let entry_pred = parser.parse_predicate(&req.entry_conditions.tokens)?;
        let exit_pred = req
            .exit_conditions
            .as_ref()
            .map(|c| parser.parse_predicate(&c.tokens))
            .transpose()?;

        // one planner for both predicates: identical subtrees share node ids
        let mut planner = Planner::new(req.base_tf);
        let entry_plan = planner.build(&entry_pred)?;
        let exit_plan = exit_pred.map(|p| planner.build(&p)).transpose()?;

        let mut ctx = EvalCtx::new(&req.symbol, req.base_tf, self.provider, self.policy)?;
        let mut runtime = Runtime::new(&mut ctx, self.registry);
        let entry_signal = runtime.exec_plan(&entry_plan)?;
        let exit_signal = exit_plan
            .as_ref()
            .map(|p| runtime.exec_plan(p))
            .transpose()?;

        let checker = ExitChecker {
            stop_loss: req.stop_loss,
            take_profit: req.take_profit,
            trailing_sl: req.trailing_sl,
            holding_bars: req.holding_period,
            intraday: req.intraday.as_ref(),
        };
        let outcome = run_simulation(
            ctx.base_candles(),
            &entry_signal,
            exit_signal.as_deref(),
            req.direction,
            req.quantity,
            req.capital,
            &checker,
        );

        tracing::info!(
            symbol = %req.symbol,
            timeframe = %req.base_tf,
            bars = ctx.base_len(),
            trades = outcome.trades.len(),
            "backtest complete"
        );

        let summary = compute_summary(outcome.trades, &outcome.equity, req.capital);
        Ok(BacktestResponse {
            base_timeframe: req.base_tf,
            symbol: req.symbol.clone(),
            signal: entry_signal,
            entries: outcome.entries,
            exits: outcome.exits,
            summary,
        })
    }
}
