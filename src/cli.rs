//! CLI definition and dispatch.

use clap::{Parser as ClapParser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvProvider;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestEngine, BacktestRequest};
use crate::domain::error::StratsimError;
use crate::domain::parser::Parser;
use crate::domain::registry::build_registry;
use crate::domain::runtime::NanPolicy;
use crate::ports::config_port::ConfigPort;

#[derive(ClapParser, Debug)]
#[command(name = "stratsim", about = "Token-predicate strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest from a JSON request file
    Backtest {
        #[arg(short, long)]
        request: PathBuf,
        /// Directory of {symbol}_{timeframe}.csv candle files
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate the conditions of a JSON request file
    Validate {
        #[arg(short, long)]
        request: PathBuf,
    },
    /// List the indicator and function catalog
    Indicators,
    /// Show version information
    Info,
}

pub fn init_tracing() {
    let filter = std::env::var("STRATSIM_LOG").unwrap_or_else(|_| "info".to_string());
    if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_new(filter) {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            request,
            data,
            config,
        } => run_backtest(&request, data, config),
        Command::Validate { request } => run_validate(&request),
        Command::Indicators => run_indicators(),
        Command::Info => run_info(),
    }
}

fn fail(err: &StratsimError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

fn load_request(path: &Path) -> Result<BacktestRequest, StratsimError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn run_backtest(request: &Path, data: Option<PathBuf>, config: Option<PathBuf>) -> ExitCode {
    let req = match load_request(request) {
        Ok(req) => req,
        Err(err) => return fail(&err),
    };

    let mut data_path = data;
    let mut policy = NanPolicy::default();
    if let Some(config_path) = config {
        let adapter = match FileConfigAdapter::from_file(&config_path) {
            Ok(adapter) => adapter,
            Err(e) => {
                return fail(&StratsimError::ConfigParse {
                    file: config_path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };
        if data_path.is_none() {
            data_path = adapter.get_string("data", "path").map(PathBuf::from);
        }
        policy.nan_is_false = adapter.get_bool("engine", "nan_is_false", policy.nan_is_false);
    }
    let Some(data_path) = data_path else {
        return fail(&StratsimError::InvalidRequest {
            reason: "no data directory: pass --data or set [data] path in the config".into(),
        });
    };

    let mut provider = CsvProvider::new(data_path);
    match parse_window(&req) {
        Ok(Some((start, end))) => provider = provider.with_window(start, end),
        Ok(None) => {}
        Err(err) => return fail(&err),
    }

    let registry = build_registry();
    let engine = BacktestEngine::new(&provider, &registry).with_policy(policy);
    match engine.run(&req) {
        Ok(response) => match serde_json::to_string_pretty(&response) {
            Ok(body) => {
                println!("{body}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e.into()),
        },
        Err(err) => fail(&err),
    }
}

fn parse_window(
    req: &BacktestRequest,
) -> Result<Option<(chrono::NaiveDateTime, chrono::NaiveDateTime)>, StratsimError> {
    let parse = |s: &str, end_of_day: bool| {
        let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
            StratsimError::InvalidRequest {
                reason: format!("invalid date {s:?}: {e}"),
            }
        })?;
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        time.ok_or_else(|| StratsimError::InvalidRequest {
            reason: format!("invalid date {s:?}"),
        })
    };
    match (&req.start, &req.end) {
        (Some(start), Some(end)) => Ok(Some((parse(start, false)?, parse(end, true)?))),
        (None, None) => Ok(None),
        _ => Err(StratsimError::InvalidRequest {
            reason: "start and end must be given together".into(),
        }),
    }
}

fn run_validate(request: &Path) -> ExitCode {
    let req = match load_request(request) {
        Ok(req) => req,
        Err(err) => return fail(&err),
    };
    let registry = build_registry();
    let parser = Parser::new(&registry);
    if let Err(err) = parser.validate(&req.entry_conditions) {
        eprintln!("entry conditions: {err}");
        return (&err).into();
    }
    if let Some(exit) = &req.exit_conditions {
        if let Err(err) = parser.validate(exit) {
            eprintln!("exit conditions: {err}");
            return (&err).into();
        }
    }
    eprintln!("conditions: ok");
    ExitCode::SUCCESS
}

fn run_indicators() -> ExitCode {
    let registry = build_registry();
    let mut indicators: Vec<_> = registry.indicators.iter().collect();
    indicators.sort_by_key(|(name, _)| name.to_string());
    println!("indicators:");
    for (name, spec) in indicators {
        let params: Vec<&str> = spec.params.iter().map(|p| p.name).collect();
        println!("  {name}({}): {}", params.join(", "), spec.description);
    }
    let mut functions: Vec<_> = registry.functions.iter().collect();
    functions.sort_by_key(|(name, _)| name.to_string());
    println!("functions:");
    for (name, spec) in functions {
        let params: Vec<&str> = spec.params.iter().map(|p| p.name).collect();
        println!("  {name}({}): {}", params.join(", "), spec.description);
    }
    ExitCode::SUCCESS
}

fn run_info() -> ExitCode {
    eprintln!("stratsim {}", env!("CARGO_PKG_VERSION"));
    eprintln!("Token-predicate strategy backtester");
    ExitCode::SUCCESS
}
