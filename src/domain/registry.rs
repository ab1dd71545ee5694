//! Indicator and function catalog.
//!
//! The registry is a read-only map from case-sensitive names to specs. Each
//! spec carries a category, a description, a parameter schema used by the
//! parser for validation, and an evaluator invoked by the runtime. Indicator
//! evaluators are timeframe-aware and read candles through the evaluation
//! context; function evaluators operate on the expression argument series the
//! planner wired up as dependencies.

use crate::domain::error::StratsimError;
use crate::domain::runtime::{EvalCtx, Series};
use crate::domain::ta;
use crate::domain::ta::{channels, momentum, trend, volume};
use crate::domain::timeframe::Timeframe;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Int,
    Float,
    /// Nested expression, resolved by the planner into a dependency series.
    Expr,
}

#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: &'static str,
    pub ty: ArgType,
    pub required: bool,
}

impl ArgSpec {
    pub const fn int(name: &'static str) -> Self {
        ArgSpec {
            name,
            ty: ArgType::Int,
            required: true,
        }
    }

    pub const fn float(name: &'static str) -> Self {
        ArgSpec {
            name,
            ty: ArgType::Float,
            required: true,
        }
    }

    pub const fn expr(name: &'static str) -> Self {
        ArgSpec {
            name,
            ty: ArgType::Expr,
            required: true,
        }
    }
}

pub type IndicatorEval = Box<
    dyn Fn(&mut EvalCtx, Timeframe, &BTreeMap<String, f64>, &[Series]) -> Result<Series, StratsimError>
        + Send
        + Sync,
>;

pub type FunctionEval = Box<
    dyn Fn(&mut EvalCtx, &BTreeMap<String, f64>, &[Series]) -> Result<Series, StratsimError>
        + Send
        + Sync,
>;

pub struct IndicatorSpec {
    pub category: &'static str,
    pub description: &'static str,
    pub params: Vec<ArgSpec>,
    pub eval: IndicatorEval,
}

pub struct FunctionSpec {
    pub category: &'static str,
    pub description: &'static str,
    pub params: Vec<ArgSpec>,
    pub eval: FunctionEval,
}

#[derive(Default)]
pub struct Registry {
    pub indicators: HashMap<String, IndicatorSpec>,
    pub functions: HashMap<String, FunctionSpec>,
}

impl Registry {
    fn indicator(
        &mut self,
        name: &str,
        category: &'static str,
        description: &'static str,
        params: Vec<ArgSpec>,
        eval: IndicatorEval,
    ) {
        self.indicators.insert(
            name.to_string(),
            IndicatorSpec {
                category,
                description,
                params,
                eval,
            },
        );
    }

    fn function(
        &mut self,
        name: &str,
        category: &'static str,
        description: &'static str,
        params: Vec<ArgSpec>,
        eval: FunctionEval,
    ) {
        self.functions.insert(
            name.to_string(),
            FunctionSpec {
                category,
                description,
                params,
                eval,
            },
        );
    }
}

/// Check a provided parameter-name set against a schema: every required name
/// present, no unknown names.
pub fn check_params<'a>(
    owner: &str,
    spec: &[ArgSpec],
    provided: impl Iterator<Item = &'a String>,
) -> Result<(), StratsimError> {
    let mut required: Vec<&str> = spec.iter().filter(|a| a.required).map(|a| a.name).collect();
    for name in provided {
        if !spec.iter().any(|a| a.name == name) {
            return Err(StratsimError::UnknownParam {
                owner: owner.to_string(),
                name: name.clone(),
            });
        }
        required.retain(|r| r != name);
    }
    if !required.is_empty() {
        return Err(StratsimError::MissingParams {
            owner: owner.to_string(),
            names: required.into_iter().map(String::from).collect(),
        });
    }
    Ok(())
}

fn int_param(params: &BTreeMap<String, f64>, name: &str) -> usize {
    params.get(name).copied().unwrap_or_default() as usize
}

fn float_param(params: &BTreeMap<String, f64>, name: &str) -> f64 {
    params.get(name).copied().unwrap_or_default()
}

fn first_arg<'a>(owner: &str, args: &'a [Series]) -> Result<&'a Series, StratsimError> {
    args.first().ok_or_else(|| StratsimError::InvalidRequest {
        reason: format!("{owner} requires an input series"),
    })
}

/// Build the full catalog.
pub fn build_registry() -> Registry {
    let mut reg = Registry::default();
    register_price_sources(&mut reg);
    register_averages(&mut reg);
    register_momentum(&mut reg);
    register_channels(&mut reg);
    register_trend(&mut reg);
    register_volume(&mut reg);
    register_functions(&mut reg);
    reg
}

fn register_price_sources(reg: &mut Registry) {
    let fields: [(&str, fn(&crate::domain::candle::Candle) -> f64); 5] = [
        ("Open", |b| b.open),
        ("High", |b| b.high),
        ("Low", |b| b.low),
        ("Close", |b| b.close),
        ("Volume", |b| b.volume),
    ];
    for (name, get) in fields {
        reg.indicator(
            name,
            "Price",
            "Raw price field",
            vec![],
            Box::new(move |ctx, tf, _params, _args| {
                Ok(ctx.candles(tf)?.iter().map(get).collect())
            }),
        );
    }
    reg.indicator(
        "Time",
        "Time",
        "Bar time as epoch seconds",
        vec![],
        Box::new(|ctx, tf, _params, _args| {
            Ok(ctx
                .candles(tf)?
                .iter()
                .map(|b| b.time.and_utc().timestamp() as f64)
                .collect())
        }),
    );
}

fn register_averages(reg: &mut Registry) {
    let simple: [(&str, &'static str, fn(&[f64], usize) -> Vec<f64>); 7] = [
        ("SMA", "Simple moving average", ta::sma),
        ("EMA", "Exponential moving average", ta::ema),
        ("WMA", "Weighted moving average", ta::wma),
        ("DEMA", "Double exponential moving average", ta::dema),
        ("TEMA", "Triple exponential moving average", ta::tema),
        ("TMA", "Triangular moving average", ta::tma),
        ("HMA", "Hull moving average", ta::hma),
    ];
    for (name, description, calc) in simple {
        reg.indicator(
            name,
            "Trend",
            description,
            vec![ArgSpec::int("period")],
            Box::new(move |ctx, tf, params, _args| {
                let closes = ta::extract_closes(ctx.candles(tf)?);
                Ok(calc(&closes, int_param(params, "period")))
            }),
        );
    }

    reg.indicator(
        "StdDev",
        "Volatility",
        "Rolling standard deviation of closes",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            let closes = ta::extract_closes(ctx.candles(tf)?);
            Ok(ta::stddev(&closes, int_param(params, "period")))
        }),
    );
    reg.indicator(
        "ATR",
        "Volatility",
        "Average true range (Wilder)",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            Ok(ta::atr(ctx.candles(tf)?, int_param(params, "period")))
        }),
    );
    reg.indicator(
        "NATR",
        "Volatility",
        "ATR normalized by close, in percent",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            Ok(ta::natr(ctx.candles(tf)?, int_param(params, "period")))
        }),
    );
}

fn register_momentum(reg: &mut Registry) {
    reg.indicator(
        "RSI",
        "Momentum",
        "Relative strength index (Wilder)",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            let closes = ta::extract_closes(ctx.candles(tf)?);
            Ok(momentum::rsi(&closes, int_param(params, "period")))
        }),
    );
    reg.indicator(
        "ROC",
        "Momentum",
        "Rate of change, percent",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            let closes = ta::extract_closes(ctx.candles(tf)?);
            Ok(ta::roc(&closes, int_param(params, "period")))
        }),
    );
    reg.indicator(
        "Momentum",
        "Momentum",
        "Close minus close p bars ago",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            let closes = ta::extract_closes(ctx.candles(tf)?);
            Ok(ta::momentum(&closes, int_param(params, "period")))
        }),
    );

    let macd_params = || {
        vec![
            ArgSpec::int("fast"),
            ArgSpec::int("slow"),
            ArgSpec::int("signal"),
        ]
    };
    let macd_part = |pick: fn((Vec<f64>, Vec<f64>, Vec<f64>)) -> Vec<f64>| -> IndicatorEval {
        Box::new(move |ctx: &mut EvalCtx, tf, params: &BTreeMap<String, f64>, _args: &[Series]| {
            let closes = ta::extract_closes(ctx.candles(tf)?);
            let parts = momentum::macd(
                &closes,
                int_param(params, "fast"),
                int_param(params, "slow"),
                int_param(params, "signal"),
            );
            Ok(pick(parts))
        })
    };
    reg.indicator("MACD", "Momentum", "MACD line", macd_params(), macd_part(|p| p.0));
    reg.indicator(
        "MACDSignal",
        "Momentum",
        "MACD signal line",
        macd_params(),
        macd_part(|p| p.1),
    );
    reg.indicator(
        "MACDHistogram",
        "Momentum",
        "MACD histogram",
        macd_params(),
        macd_part(|p| p.2),
    );

    let stoch_params = || vec![ArgSpec::int("k_period"), ArgSpec::int("d_period")];
    reg.indicator(
        "StochasticK",
        "Momentum",
        "Stochastic %K",
        stoch_params(),
        Box::new(|ctx, tf, params, _args| {
            let bars = ctx.candles(tf)?;
            let (k, _d) = momentum::stochastic(
                bars,
                int_param(params, "k_period"),
                int_param(params, "d_period"),
            );
            Ok(k)
        }),
    );
    reg.indicator(
        "StochasticD",
        "Momentum",
        "Stochastic %D",
        stoch_params(),
        Box::new(|ctx, tf, params, _args| {
            let bars = ctx.candles(tf)?;
            let (_k, d) = momentum::stochastic(
                bars,
                int_param(params, "k_period"),
                int_param(params, "d_period"),
            );
            Ok(d)
        }),
    );

    reg.indicator(
        "WilliamsR",
        "Momentum",
        "Williams %R",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            Ok(momentum::williams_r(ctx.candles(tf)?, int_param(params, "period")))
        }),
    );
    reg.indicator(
        "CCI",
        "Momentum",
        "Commodity channel index",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            Ok(momentum::cci(ctx.candles(tf)?, int_param(params, "period")))
        }),
    );
    reg.indicator(
        "MFI",
        "Momentum",
        "Money flow index",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            Ok(momentum::mfi(ctx.candles(tf)?, int_param(params, "period")))
        }),
    );
    reg.indicator(
        "TRIX",
        "Momentum",
        "Triple-EMA rate of change",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            let closes = ta::extract_closes(ctx.candles(tf)?);
            Ok(momentum::trix(&closes, int_param(params, "period")))
        }),
    );
    reg.indicator(
        "AwesomeOscillator",
        "Momentum",
        "SMA(5) - SMA(34) of median price",
        vec![],
        Box::new(|ctx, tf, _params, _args| Ok(momentum::awesome_oscillator(ctx.candles(tf)?))),
    );
}

fn register_channels(reg: &mut Registry) {
    let boll_params = || vec![ArgSpec::int("period"), ArgSpec::float("mult")];
    let boll_part = |pick: fn((Vec<f64>, Vec<f64>, Vec<f64>)) -> Vec<f64>| -> IndicatorEval {
        Box::new(move |ctx: &mut EvalCtx, tf, params: &BTreeMap<String, f64>, _args: &[Series]| {
            let closes = ta::extract_closes(ctx.candles(tf)?);
            let bands = channels::bollinger(
                &closes,
                int_param(params, "period"),
                float_param(params, "mult"),
            );
            Ok(pick(bands))
        })
    };
    reg.indicator(
        "BollingerUpper",
        "Volatility",
        "Bollinger upper band",
        boll_params(),
        boll_part(|b| b.0),
    );
    reg.indicator(
        "BollingerMiddle",
        "Volatility",
        "Bollinger middle band",
        boll_params(),
        boll_part(|b| b.1),
    );
    reg.indicator(
        "BollingerLower",
        "Volatility",
        "Bollinger lower band",
        boll_params(),
        boll_part(|b| b.2),
    );

    let keltner_params = || {
        vec![
            ArgSpec::int("ema_period"),
            ArgSpec::int("atr_period"),
            ArgSpec::float("mult"),
        ]
    };
    let keltner_part = |pick: fn((Vec<f64>, Vec<f64>, Vec<f64>)) -> Vec<f64>| -> IndicatorEval {
        Box::new(move |ctx: &mut EvalCtx, tf, params: &BTreeMap<String, f64>, _args: &[Series]| {
            let bands = channels::keltner(
                ctx.candles(tf)?,
                int_param(params, "ema_period"),
                int_param(params, "atr_period"),
                float_param(params, "mult"),
            );
            Ok(pick(bands))
        })
    };
    reg.indicator(
        "KeltnerUpper",
        "Volatility",
        "Keltner upper channel",
        keltner_params(),
        keltner_part(|b| b.0),
    );
    reg.indicator(
        "KeltnerMiddle",
        "Volatility",
        "Keltner middle line",
        keltner_params(),
        keltner_part(|b| b.1),
    );
    reg.indicator(
        "KeltnerLower",
        "Volatility",
        "Keltner lower channel",
        keltner_params(),
        keltner_part(|b| b.2),
    );

    let donchian_part = |pick: fn((Vec<f64>, Vec<f64>, Vec<f64>)) -> Vec<f64>| -> IndicatorEval {
        Box::new(move |ctx: &mut EvalCtx, tf, params: &BTreeMap<String, f64>, _args: &[Series]| {
            let bands = channels::donchian(ctx.candles(tf)?, int_param(params, "period"));
            Ok(pick(bands))
        })
    };
    reg.indicator(
        "DonchianUpper",
        "Trend",
        "Donchian upper channel",
        vec![ArgSpec::int("period")],
        donchian_part(|b| b.0),
    );
    reg.indicator(
        "DonchianLower",
        "Trend",
        "Donchian lower channel",
        vec![ArgSpec::int("period")],
        donchian_part(|b| b.1),
    );
    reg.indicator(
        "DonchianMiddle",
        "Trend",
        "Donchian midline",
        vec![ArgSpec::int("period")],
        donchian_part(|b| b.2),
    );
}

fn register_trend(reg: &mut Registry) {
    reg.indicator(
        "Supertrend",
        "Trend",
        "Supertrend line",
        vec![ArgSpec::int("period"), ArgSpec::float("mult")],
        Box::new(|ctx, tf, params, _args| {
            let (line, _dir) = trend::supertrend(
                ctx.candles(tf)?,
                int_param(params, "period"),
                float_param(params, "mult"),
            );
            Ok(line)
        }),
    );
    reg.indicator(
        "PSAR",
        "Trend",
        "Parabolic SAR",
        vec![
            ArgSpec::float("af"),
            ArgSpec::float("inc"),
            ArgSpec::float("max"),
        ],
        Box::new(|ctx, tf, params, _args| {
            Ok(trend::psar(
                ctx.candles(tf)?,
                float_param(params, "af"),
                float_param(params, "inc"),
                float_param(params, "max"),
            ))
        }),
    );

    let adx_part = |pick: fn((Vec<f64>, Vec<f64>, Vec<f64>)) -> Vec<f64>| -> IndicatorEval {
        Box::new(move |ctx: &mut EvalCtx, tf, params: &BTreeMap<String, f64>, _args: &[Series]| {
            let parts = trend::adx(ctx.candles(tf)?, int_param(params, "period"));
            Ok(pick(parts))
        })
    };
    reg.indicator(
        "ADX",
        "Trend",
        "Average directional index",
        vec![ArgSpec::int("period")],
        adx_part(|p| p.0),
    );
    reg.indicator(
        "PlusDI",
        "Trend",
        "+DI directional line",
        vec![ArgSpec::int("period")],
        adx_part(|p| p.1),
    );
    reg.indicator(
        "MinusDI",
        "Trend",
        "-DI directional line",
        vec![ArgSpec::int("period")],
        adx_part(|p| p.2),
    );

    let aroon_part = |pick: fn((Vec<f64>, Vec<f64>, Vec<f64>)) -> Vec<f64>| -> IndicatorEval {
        Box::new(move |ctx: &mut EvalCtx, tf, params: &BTreeMap<String, f64>, _args: &[Series]| {
            let parts = trend::aroon(ctx.candles(tf)?, int_param(params, "period"));
            Ok(pick(parts))
        })
    };
    reg.indicator(
        "AroonUp",
        "Trend",
        "Aroon up",
        vec![ArgSpec::int("period")],
        aroon_part(|p| p.0),
    );
    reg.indicator(
        "AroonDown",
        "Trend",
        "Aroon down",
        vec![ArgSpec::int("period")],
        aroon_part(|p| p.1),
    );
    reg.indicator(
        "AroonOsc",
        "Trend",
        "Aroon oscillator",
        vec![ArgSpec::int("period")],
        aroon_part(|p| p.2),
    );

    reg.indicator(
        "VortexPlus",
        "Trend",
        "Vortex +VI",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            let (plus, _minus) = trend::vortex(ctx.candles(tf)?, int_param(params, "period"));
            Ok(plus)
        }),
    );
    reg.indicator(
        "VortexMinus",
        "Trend",
        "Vortex -VI",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            let (_plus, minus) = trend::vortex(ctx.candles(tf)?, int_param(params, "period"));
            Ok(minus)
        }),
    );

    let ichimoku_params = || {
        vec![
            ArgSpec::int("conv_period"),
            ArgSpec::int("base_period"),
            ArgSpec::int("span_b_period"),
        ]
    };
    let ichimoku_part = |idx: usize| -> IndicatorEval {
        Box::new(move |ctx: &mut EvalCtx, tf, params: &BTreeMap<String, f64>, _args: &[Series]| {
            let (tenkan, kijun, senkou_a, senkou_b, _chikou) = trend::ichimoku(
                ctx.candles(tf)?,
                int_param(params, "conv_period"),
                int_param(params, "base_period"),
                int_param(params, "span_b_period"),
            );
            Ok(match idx {
                0 => tenkan,
                1 => kijun,
                2 => senkou_a,
                _ => senkou_b,
            })
        })
    };
    reg.indicator(
        "IchimokuTenkan",
        "Trend",
        "Ichimoku conversion line",
        ichimoku_params(),
        ichimoku_part(0),
    );
    reg.indicator(
        "IchimokuKijun",
        "Trend",
        "Ichimoku base line",
        ichimoku_params(),
        ichimoku_part(1),
    );
    reg.indicator(
        "IchimokuSenkouA",
        "Trend",
        "Ichimoku leading span A",
        ichimoku_params(),
        ichimoku_part(2),
    );
    reg.indicator(
        "IchimokuSenkouB",
        "Trend",
        "Ichimoku leading span B",
        ichimoku_params(),
        ichimoku_part(3),
    );

    reg.indicator(
        "Choppiness",
        "Trend",
        "Choppiness index",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            Ok(trend::choppiness(ctx.candles(tf)?, int_param(params, "period")))
        }),
    );
}

fn register_volume(reg: &mut Registry) {
    reg.indicator(
        "OBV",
        "Volume",
        "On-balance volume",
        vec![],
        Box::new(|ctx, tf, _params, _args| Ok(volume::obv(ctx.candles(tf)?))),
    );
    reg.indicator(
        "VWAP",
        "Volume",
        "Cumulative volume-weighted average price",
        vec![],
        Box::new(|ctx, tf, _params, _args| Ok(volume::vwap(ctx.candles(tf)?))),
    );
    reg.indicator(
        "ChaikinMF",
        "Volume",
        "Chaikin money flow",
        vec![ArgSpec::int("period")],
        Box::new(|ctx, tf, params, _args| {
            Ok(volume::chaikin_money_flow(
                ctx.candles(tf)?,
                int_param(params, "period"),
            ))
        }),
    );
}

fn register_functions(reg: &mut Registry) {
    let windowed: [(&str, &'static str, fn(&[f64], usize) -> Vec<f64>); 6] = [
        ("SMA", "Simple moving average of an expression", ta::sma),
        ("EMA", "Exponential moving average of an expression", ta::ema),
        ("WMA", "Weighted moving average of an expression", ta::wma),
        ("StdDev", "Rolling standard deviation of an expression", ta::stddev),
        ("Highest", "Rolling maximum of an expression", ta::highest),
        ("Lowest", "Rolling minimum of an expression", ta::lowest),
    ];
    for (name, description, calc) in windowed {
        reg.function(
            name,
            "Technical",
            description,
            vec![ArgSpec::int("period"), ArgSpec::expr("source")],
            Box::new(move |_ctx, params, args| {
                let source = first_arg(name, args)?;
                Ok(calc(source, int_param(params, "period")))
            }),
        );
    }

    reg.function(
        "Abs",
        "Math",
        "Absolute value of an expression",
        vec![ArgSpec::expr("source")],
        Box::new(|_ctx, _params, args| {
            Ok(first_arg("Abs", args)?.iter().map(|v| v.abs()).collect())
        }),
    );
    reg.function(
        "Change",
        "Math",
        "Difference against the value p bars ago",
        vec![ArgSpec::int("period"), ArgSpec::expr("source")],
        Box::new(|_ctx, params, args| {
            let source = first_arg("Change", args)?;
            Ok(ta::momentum(source, int_param(params, "period")))
        }),
    );
}
