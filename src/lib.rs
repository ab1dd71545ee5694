//! stratsim — token-predicate strategy backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].
//!
//! The pipeline: a token stream is parsed into a predicate tree
//! ([`domain::parser`]), lowered into a deduplicated DAG ([`domain::planner`]),
//! executed against a data provider into a boolean signal series
//! ([`domain::runtime`]), and fed through the bar-by-bar trade simulator
//! ([`domain::simulator`]) to produce a trade log, equity curve and summary.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
