//! Technical-analysis primitives.
//!
//! Every function here is pure: input series and parameters in, a series of
//! the same length out. Positions with insufficient history carry `NaN`.
//! Exponential smoothings seed with the first finite value; Wilder smoothings
//! are noted where an EMA approximation is used.

pub mod channels;
pub mod momentum;
pub mod trend;
pub mod volume;

use crate::domain::candle::Candle;

pub fn extract_opens(bars: &[Candle]) -> Vec<f64> {
    bars.iter().map(|b| b.open).collect()
}

pub fn extract_highs(bars: &[Candle]) -> Vec<f64> {
    bars.iter().map(|b| b.high).collect()
}

pub fn extract_lows(bars: &[Candle]) -> Vec<f64> {
    bars.iter().map(|b| b.low).collect()
}

pub fn extract_closes(bars: &[Candle]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

pub fn extract_volumes(bars: &[Candle]) -> Vec<f64> {
    bars.iter().map(|b| b.volume).collect()
}

pub fn typical_prices(bars: &[Candle]) -> Vec<f64> {
    bars.iter().map(|b| b.typical_price()).collect()
}

pub fn median_prices(bars: &[Candle]) -> Vec<f64> {
    bars.iter().map(|b| (b.high + b.low) / 2.0).collect()
}

/// Simple moving average. A window containing a NaN yields NaN.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    let mut sum = 0.0;
    let mut nan_in_window = 0usize;
    for i in 0..values.len() {
        let v = values[i];
        if v.is_nan() {
            nan_in_window += 1;
        } else {
            sum += v;
        }
        if i >= period {
            let leaving = values[i - period];
            if leaving.is_nan() {
                nan_in_window -= 1;
            } else {
                sum -= leaving;
            }
        }
        if i + 1 >= period && nan_in_window == 0 {
            out[i] = sum / period as f64;
        }
    }
    out
}

/// Exponential moving average, k = 2/(p+1). Seeds with the first finite
/// value; leading NaNs are preserved and interior NaNs are skipped.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut prev: Option<f64> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        let next = match prev {
            None => v,
            Some(p) => v * k + p * (1.0 - k),
        };
        out[i] = next;
        prev = Some(next);
    }
    out
}

/// Weighted moving average with linear weights 1..=p.
pub fn wma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    let den = (period * (period + 1)) as f64 / 2.0;
    for i in 0..values.len() {
        if i + 1 < period {
            continue;
        }
        let mut num = 0.0;
        for w in 1..=period {
            num += w as f64 * values[i - (period - w)];
        }
        out[i] = num / den;
    }
    out
}

/// Double exponential moving average: 2*EMA - EMA(EMA).
pub fn dema(values: &[f64], period: usize) -> Vec<f64> {
    let e = ema(values, period);
    let e2 = ema(&e, period);
    e.iter().zip(&e2).map(|(a, b)| 2.0 * a - b).collect()
}

/// Triple exponential moving average: 3*(EMA - EMA2) + EMA3.
pub fn tema(values: &[f64], period: usize) -> Vec<f64> {
    let e1 = ema(values, period);
    let e2 = ema(&e1, period);
    let e3 = ema(&e2, period);
    (0..values.len())
        .map(|i| 3.0 * (e1[i] - e2[i]) + e3[i])
        .collect()
}

/// Triangular moving average: SMA of SMA with half period.
pub fn tma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    let m = period.div_ceil(2);
    sma(&sma(values, m), m)
}

/// Hull moving average: WMA(2*WMA(p/2) - WMA(p), sqrt(p)).
pub fn hma(values: &[f64], period: usize) -> Vec<f64> {
    if period <= 1 {
        return values.to_vec();
    }
    let half = wma(values, period / 2);
    let full = wma(values, period);
    let diff: Vec<f64> = half.iter().zip(&full).map(|(h, f)| 2.0 * h - f).collect();
    wma(&diff, (period as f64).sqrt().round() as usize)
}

/// Rolling population standard deviation.
pub fn stddev(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    let mean = sma(values, period);
    for i in 0..values.len() {
        if i + 1 < period || mean[i].is_nan() {
            continue;
        }
        let mut s = 0.0;
        for j in i + 1 - period..=i {
            let d = values[j] - mean[i];
            s += d * d;
        }
        out[i] = (s / period as f64).sqrt();
    }
    out
}

/// Rate of change over p bars, in percent.
pub fn roc(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in period..values.len() {
        out[i] = (values[i] / values[i - period] - 1.0) * 100.0;
    }
    out
}

/// Momentum: close - close[p].
pub fn momentum(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in period..values.len() {
        out[i] = values[i] - values[i - period];
    }
    out
}

/// Rolling maximum over `period` values.
pub fn highest(values: &[f64], period: usize) -> Vec<f64> {
    rolling_extreme(values, period, f64::max)
}

/// Rolling minimum over `period` values.
pub fn lowest(values: &[f64], period: usize) -> Vec<f64> {
    rolling_extreme(values, period, f64::min)
}

fn rolling_extreme(values: &[f64], period: usize, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in 0..values.len() {
        if i + 1 < period {
            continue;
        }
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = window.iter().copied().fold(window[0], pick);
    }
    out
}

/// True range per bar; bar 0 uses high - low.
pub fn true_range(bars: &[Candle]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

/// Average true range, Wilder smoothing: seed with the mean of the first p
/// true ranges, then (prev*(p-1) + tr) / p.
pub fn atr(bars: &[Candle], period: usize) -> Vec<f64> {
    let tr = true_range(bars);
    wilder_smooth(&tr, period)
}

/// Normalized ATR: 100 * ATR / close.
pub fn natr(bars: &[Candle], period: usize) -> Vec<f64> {
    let a = atr(bars, period);
    bars.iter()
        .zip(&a)
        .map(|(bar, v)| 100.0 * v / bar.close)
        .collect()
}

/// Wilder recursive smoothing with an SMA seed; NaN while warming up.
pub(crate) fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = seed;
    let mut prev = seed;
    for i in period..values.len() {
        prev = (prev * (period - 1) as f64 + values[i]) / period as f64;
        out[i] = prev;
    }
    out
}

#[cfg(test)]
pub(crate) fn flat_bars(closes: &[f64]) -> Vec<Candle> {
    use chrono::NaiveDate;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            time: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap()
                + chrono::Duration::minutes(5 * i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        })
        .collect()
}
