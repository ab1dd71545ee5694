//! Band and channel indicators.

use super::{atr, ema, extract_closes, sma, stddev};
use crate::domain::candle::Candle;

/// Bollinger bands: (upper, middle, lower) with middle = SMA and k standard
/// deviations either side.
pub fn bollinger(values: &[f64], period: usize, k: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let middle = sma(values, period);
    let sd = stddev(values, period);
    let upper: Vec<f64> = middle.iter().zip(&sd).map(|(m, s)| m + k * s).collect();
    let lower: Vec<f64> = middle.iter().zip(&sd).map(|(m, s)| m - k * s).collect();
    (upper, middle, lower)
}

/// Keltner channels: middle = EMA(close), bands at k * ATR.
pub fn keltner(
    bars: &[Candle],
    ema_period: usize,
    atr_period: usize,
    k: f64,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let closes = extract_closes(bars);
    let middle = ema(&closes, ema_period);
    let a = atr(bars, atr_period);
    let upper: Vec<f64> = middle.iter().zip(&a).map(|(m, v)| m + k * v).collect();
    let lower: Vec<f64> = middle.iter().zip(&a).map(|(m, v)| m - k * v).collect();
    (upper, middle, lower)
}

/// Donchian channels: (upper, lower, middle) = highest high / lowest low
/// over `period` and their midpoint.
pub fn donchian(bars: &[Candle], period: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = bars.len();
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];
    let mut middle = vec![f64::NAN; n];
    for i in 0..n {
        if i + 1 < period {
            continue;
        }
        let window = &bars[i + 1 - period..=i];
        let h = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let l = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        upper[i] = h;
        lower[i] = l;
        middle[i] = (h + l) / 2.0;
    }
    (upper, lower, middle)
}
