//! Oscillators and momentum indicators.

use super::{ema, median_prices, sma, stddev, typical_prices};
use crate::domain::candle::Candle;

/// Relative Strength Index (Wilder). NaN until `period` changes have been
/// observed; the seed averages the first `period` gains/losses and the
/// recursion keeps running Wilder averages thereafter.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }
    let mut gains = vec![0.0; values.len()];
    let mut losses = vec![0.0; values.len()];
    for i in 1..values.len() {
        let chg = values[i] - values[i - 1];
        gains[i] = chg.max(0.0);
        losses[i] = (-chg).max(0.0);
    }

    let mut avg_gain: f64 = gains[1..=period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[1..=period].iter().sum::<f64>() / period as f64;
    out[period] = rsi_from_averages(avg_gain, avg_loss);

    for i in period + 1..values.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        out[i] = rsi_from_averages(avg_gain, avg_loss);
    }
    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = avg_gain / avg_loss.max(1e-12);
    100.0 - 100.0 / (1.0 + rs)
}

/// MACD line, signal and histogram. Typical periods 12/26/9.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let sig = ema(&line, signal);
    let hist: Vec<f64> = line.iter().zip(&sig).map(|(l, s)| l - s).collect();
    (line, sig, hist)
}

/// Stochastic %K over `k_period` with %D = SMA(%K, d_period).
/// A flat high-low window yields %K = 0, matching the reference behavior.
pub fn stochastic(bars: &[Candle], k_period: usize, d_period: usize) -> (Vec<f64>, Vec<f64>) {
    let mut k_vals = vec![f64::NAN; bars.len()];
    for i in 0..bars.len() {
        if i + 1 < k_period {
            continue;
        }
        let window = &bars[i + 1 - k_period..=i];
        let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let den = highest - lowest;
        k_vals[i] = if den == 0.0 {
            0.0
        } else {
            (bars[i].close - lowest) / den * 100.0
        };
    }
    let d_vals = sma(&k_vals, d_period);
    (k_vals, d_vals)
}

/// Williams %R: -100..0 oscillator over the last `period` bars.
pub fn williams_r(bars: &[Candle], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; bars.len()];
    for i in 0..bars.len() {
        if i + 1 < period {
            continue;
        }
        let window = &bars[i + 1 - period..=i];
        let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let den = highest - lowest;
        out[i] = if den == 0.0 {
            0.0
        } else {
            -100.0 * (highest - bars[i].close) / den
        };
    }
    out
}

/// Commodity Channel Index over typical price.
pub fn cci(bars: &[Candle], period: usize) -> Vec<f64> {
    let typ = typical_prices(bars);
    let ma = sma(&typ, period);
    let sd = stddev(&typ, period);
    (0..bars.len())
        .map(|i| (typ[i] - ma[i]) / (0.015 * sd[i]))
        .collect()
}

/// Money Flow Index over `period` bars.
pub fn mfi(bars: &[Candle], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; bars.len()];
    if bars.is_empty() {
        return out;
    }
    let typ = typical_prices(bars);
    let raw: Vec<f64> = typ
        .iter()
        .zip(bars)
        .map(|(t, bar)| t * bar.volume)
        .collect();
    for i in 0..bars.len() {
        if i < period {
            continue;
        }
        let mut pos = 0.0;
        let mut neg = 0.0;
        for j in i + 1 - period..=i {
            if typ[j] - typ[j - 1] >= 0.0 {
                pos += raw[j];
            } else {
                neg += raw[j];
            }
        }
        let ratio = pos / neg.max(1e-12);
        out[i] = 100.0 - 100.0 / (1.0 + ratio);
    }
    out
}

/// TRIX: percent rate of change of a triple EMA.
pub fn trix(values: &[f64], period: usize) -> Vec<f64> {
    let e1 = ema(values, period);
    let e2 = ema(&e1, period);
    let e3 = ema(&e2, period);
    let mut out = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        out[i] = if e3[i - 1] == 0.0 {
            0.0
        } else {
            (e3[i] / e3[i - 1] - 1.0) * 100.0
        };
    }
    out
}

/// Awesome Oscillator: SMA(median, 5) - SMA(median, 34).
pub fn awesome_oscillator(bars: &[Candle]) -> Vec<f64> {
    let med = median_prices(bars);
    let fast = sma(&med, 5);
    let slow = sma(&med, 34);
    fast.iter().zip(&slow).map(|(f, s)| f - s).collect()
}
