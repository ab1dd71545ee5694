#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use stratsim::adapters::memory_adapter::MemoryProvider;
use stratsim::domain::backtest::{BacktestRequest, Direction};
use stratsim::domain::candle::Candle;
use stratsim::domain::timeframe::Timeframe;
use stratsim::domain::token::{Condition, Token};

pub fn session_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap()
}

/// Flat-range candles at the base 5m spacing starting 09:15.
pub fn candles(closes: &[f64]) -> Vec<Candle> {
    candles_spaced(closes, 5)
}

pub fn candles_spaced(closes: &[f64], minutes: i64) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            time: session_start() + chrono::Duration::minutes(minutes * i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        })
        .collect()
}

pub fn provider_5m(closes: &[f64]) -> MemoryProvider {
    MemoryProvider::new().with_frame(Timeframe::M5, candles(closes))
}

pub fn close_token() -> Token {
    Token::indicator("Close", Timeframe::M5, json!({}))
}

pub fn sma_token(period: u32) -> Token {
    Token::indicator("SMA", Timeframe::M5, json!({ "period": period }))
}

pub fn condition(tokens: Vec<Token>) -> Condition {
    Condition {
        id: "cond".into(),
        name: "cond".into(),
        tokens,
    }
}

/// `Close > level` token stream.
pub fn close_above(level: f64) -> Vec<Token> {
    vec![close_token(), Token::operator(">"), Token::number(level)]
}

pub fn base_request(entry_tokens: Vec<Token>) -> BacktestRequest {
    BacktestRequest {
        symbol: "TEST".into(),
        base_tf: Timeframe::M5,
        entry_conditions: condition(entry_tokens),
        exit_conditions: None,
        direction: Direction::Long,
        quantity: 1,
        capital: 100_000.0,
        stop_loss: 0.0,
        take_profit: 0.0,
        trailing_sl: 0.0,
        start: None,
        end: None,
        intraday: None,
        holding_period: None,
    }
}
