//! End-to-end simulator scenarios driven through the full pipeline
//! (tokens -> parse -> plan -> execute -> simulate -> summary).

mod common;

use common::*;
use chrono::NaiveDate;
use stratsim::domain::backtest::{BacktestEngine, Direction};
use stratsim::domain::candle::Candle;
use stratsim::domain::registry::build_registry;
use stratsim::domain::timeframe::Timeframe;
use stratsim::adapters::memory_adapter::MemoryProvider;
use stratsim::domain::token::Token;

#[test]
fn flat_series_sma_crossover_no_trades() {
    let closes = vec![100.0; 30];
    let provider = provider_5m(&closes);
    let mut req = base_request(vec![
        sma_token(5),
        Token::operator("crosses_above"),
        sma_token(20),
    ]);
    req.capital = 50_000.0;
    let registry = build_registry();
    let resp = BacktestEngine::new(&provider, &registry).run(&req).unwrap();

    let summary = &resp.summary;
    assert_eq!(summary.total_trades, 0);
    assert_eq!(summary.net_profit, 0.0);
    assert_eq!(summary.gross_profit, 0.0);
    assert_eq!(summary.gross_loss, 0.0);
    assert_eq!(summary.win_rate, 0.0);
    assert!(resp.signal.iter().all(|&s| !s));
    assert!(summary.trades.is_empty());
}

#[test]
fn single_long_trade_take_profit() {
    let closes = [
        100.0, 101.0, 102.0, 103.0, 110.0, 111.0, 112.0, 113.0, 114.0, 115.0,
    ];
    let provider = provider_5m(&closes);
    let mut req = base_request(close_above(100.0));
    req.take_profit = 5.0;
    let registry = build_registry();
    let resp = BacktestEngine::new(&provider, &registry).run(&req).unwrap();

    assert_eq!(resp.summary.total_trades, 1);
    let trade = &resp.summary.trades[0];
    assert!((trade.entry_price - 101.0).abs() < 1e-12);
    assert!((trade.exit_price - 110.0).abs() < 1e-12);
    assert_eq!(trade.exit_reason, "TakeProfit");
    assert!((trade.pnl - 9.0).abs() < 1e-12);
    assert_eq!(resp.entries, vec![1]);
    assert_eq!(resp.exits, vec![4]);
    assert!((resp.summary.net_profit - 9.0).abs() < 1e-12);
}

#[test]
fn stop_loss_triggers_before_take_profit() {
    let closes = [100.0, 101.0, 95.0, 94.0, 110.0];
    let provider = provider_5m(&closes);
    let mut req = base_request(close_above(100.0));
    req.stop_loss = 2.0;
    req.take_profit = 5.0;
    let registry = build_registry();
    let resp = BacktestEngine::new(&provider, &registry).run(&req).unwrap();

    let trade = &resp.summary.trades[0];
    assert!((trade.entry_price - 101.0).abs() < 1e-12);
    assert!((trade.exit_price - 95.0).abs() < 1e-12);
    assert_eq!(trade.exit_reason, "StopLoss");
    assert_eq!(resp.entries[0], 1);
    assert_eq!(resp.exits[0], 2);
}

#[test]
fn trailing_stop_ratchets_and_fires() {
    let closes = [100.0, 110.0, 120.0, 115.0, 108.0];
    let provider = provider_5m(&closes);
    let mut req = base_request(vec![
        close_token(),
        Token::operator(">="),
        Token::number(100.0),
    ]);
    req.trailing_sl = 5.0;
    let registry = build_registry();
    let resp = BacktestEngine::new(&provider, &registry).run(&req).unwrap();

    assert_eq!(resp.summary.total_trades, 1);
    let trade = &resp.summary.trades[0];
    assert!((trade.entry_price - 100.0).abs() < 1e-12);
    // 115 stays above the 114 level ratcheted from the 120 high-water mark;
    // 108 is the first close at or below it
    assert!((trade.exit_price - 108.0).abs() < 1e-12);
    assert_eq!(trade.exit_reason, "TrailingStop");
    assert_eq!(resp.exits, vec![4]);
}

#[test]
fn intraday_exit_window_closes_regardless_of_pnl() {
    let start = NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(15, 5, 0)
        .unwrap();
    let closes = [100.0, 100.0, 100.0, 90.0, 95.0];
    let bars: Vec<Candle> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            time: start + chrono::Duration::minutes(5 * i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        })
        .collect();
    let provider = MemoryProvider::new().with_frame(Timeframe::M5, bars);

    let mut req = base_request(close_above(0.0));
    req.intraday = Some(stratsim::domain::backtest::IntradayRule {
        enabled: true,
        start_time: None,
        exit_time: Some("15:20".into()),
        re_enter: false,
    });
    let registry = build_registry();
    let resp = BacktestEngine::new(&provider, &registry).run(&req).unwrap();

    let trade = &resp.summary.trades[0];
    assert_eq!(trade.exit_reason, "IntradayExit");
    // the 15:20 bar, at its close, even at a loss
    assert_eq!(trade.exit_time, start + chrono::Duration::minutes(15));
    assert!((trade.exit_price - 90.0).abs() < 1e-12);
    assert!(trade.pnl < 0.0);
}

#[test]
fn short_trade_pnl() {
    let closes = [100.0, 95.0, 90.0];
    let provider = provider_5m(&closes);
    let mut req = base_request(vec![
        close_token(),
        Token::operator(">="),
        Token::number(100.0),
    ]);
    req.direction = Direction::Short;
    req.quantity = 2;
    req.exit_conditions = Some(condition(vec![
        close_token(),
        Token::operator("<="),
        Token::number(90.0),
    ]));
    let registry = build_registry();
    let resp = BacktestEngine::new(&provider, &registry).run(&req).unwrap();

    let trade = &resp.summary.trades[0];
    assert!((trade.entry_price - 100.0).abs() < 1e-12);
    assert!((trade.exit_price - 90.0).abs() < 1e-12);
    assert!((trade.pnl - 20.0).abs() < 1e-12);
    assert_eq!(trade.exit_reason, "ExitCondition");
}

#[test]
fn end_of_data_closeout_records_last_bar() {
    let closes = [100.0, 101.0, 102.0];
    let provider = provider_5m(&closes);
    let req = base_request(close_above(100.0));
    let registry = build_registry();
    let resp = BacktestEngine::new(&provider, &registry).run(&req).unwrap();

    let trade = resp.summary.trades.last().unwrap();
    assert_eq!(trade.exit_reason, "EndOfBacktest");
    assert_eq!(trade.exit_time, session_start() + chrono::Duration::minutes(10));
    assert!((trade.exit_price - 102.0).abs() < 1e-12);
}

#[test]
fn pnl_accounting_matches_equity_delta() {
    let closes = [
        100.0, 102.0, 98.0, 103.0, 99.0, 104.0, 101.0, 97.0, 105.0, 100.0,
    ];
    let provider = provider_5m(&closes);
    let mut req = base_request(close_above(100.0));
    req.exit_conditions = Some(condition(vec![
        close_token(),
        Token::operator("<"),
        Token::number(100.0),
    ]));
    req.quantity = 3;
    let registry = build_registry();
    let resp = BacktestEngine::new(&provider, &registry).run(&req).unwrap();

    let pnl_sum: f64 = resp.summary.trades.iter().map(|t| t.pnl).sum();
    assert!((resp.summary.net_profit - pnl_sum).abs() < 1e-9);
}

#[test]
fn no_two_trades_overlap() {
    let closes = [
        100.0, 102.0, 98.0, 103.0, 99.0, 104.0, 101.0, 97.0, 105.0, 100.0,
    ];
    let provider = provider_5m(&closes);
    let mut req = base_request(close_above(100.0));
    req.exit_conditions = Some(condition(vec![
        close_token(),
        Token::operator("<"),
        Token::number(100.0),
    ]));
    let registry = build_registry();
    let resp = BacktestEngine::new(&provider, &registry).run(&req).unwrap();

    assert!(resp.summary.total_trades >= 2);
    for pair in resp.summary.trades.windows(2) {
        assert!(pair[1].entry_time >= pair[0].exit_time);
    }
    for trade in &resp.summary.trades {
        assert!(trade.exit_time >= trade.entry_time);
    }
}

#[test]
fn holding_period_closes_after_n_bars() {
    let closes = [100.0, 101.0, 101.0, 101.0, 101.0, 101.0];
    let provider = provider_5m(&closes);
    let mut req = base_request(close_above(100.0));
    req.holding_period = Some(2);
    let registry = build_registry();
    let resp = BacktestEngine::new(&provider, &registry).run(&req).unwrap();

    let trade = &resp.summary.trades[0];
    assert_eq!(trade.exit_reason, "MaxHoldingPeriod");
    // entered at bar 1, exits two bars later at bar 3
    assert_eq!(resp.entries[0], 1);
    assert_eq!(resp.exits[0], 3);
    // wire field still carries minutes
    assert_eq!(trade.holding_bars, 10);
}
