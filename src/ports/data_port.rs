//! Data access port trait.
//!
//! Implementations are scoped to the request's date window: `load_ohlcv`
//! returns time-ordered bars inside that window, and `align_to` resamples a
//! series between the timeframes the provider has served. Providers must be
//! safe for concurrent reads.

use crate::domain::candle::Candle;
use crate::domain::error::StratsimError;
use crate::domain::timeframe::Timeframe;

pub trait DataProvider {
    /// Time-ordered bars for `symbol` at `timeframe` within the provider's
    /// date window.
    fn load_ohlcv(&self, symbol: &str, timeframe: Timeframe)
        -> Result<Vec<Candle>, StratsimError>;

    /// Resample `series` (produced at `from_tf`) onto the base timeframe's
    /// bar axis. Higher-to-lower forward-fills within each higher-timeframe
    /// window; lower-to-higher takes the last value inside each base-bar
    /// window. The result always has the base bar count; positions before
    /// the first source bar are NaN.
    fn align_to(
        &self,
        base_tf: Timeframe,
        series: &[f64],
        from_tf: Timeframe,
    ) -> Result<Vec<f64>, StratsimError>;
}

/// Shared alignment kernel for providers that know both bar-time axes.
pub fn align_series(
    series: &[f64],
    from_times: &[chrono::NaiveDateTime],
    base_times: &[chrono::NaiveDateTime],
    base_tf: Timeframe,
) -> Result<Vec<f64>, StratsimError> {
    if series.len() != from_times.len() {
        return Err(StratsimError::Alignment {
            reason: format!(
                "series length {} does not match source bar count {}",
                series.len(),
                from_times.len()
            ),
        });
    }
    let window = chrono::Duration::minutes(i64::from(base_tf.minutes()));
    let mut out = Vec::with_capacity(base_times.len());
    let mut j = 0usize;
    for &base_time in base_times {
        // last source bar that begins before the end of this base window
        let window_end = base_time + window;
        while j + 1 < from_times.len() && from_times[j + 1] < window_end {
            j += 1;
        }
        match from_times.get(j) {
            Some(&ft) if ft < window_end => out.push(series[j]),
            _ => out.push(f64::NAN),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(hour: u32, min: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    #[test]
    fn higher_to_lower_forward_fills() {
        // hourly values onto a 15m axis
        let from_times = vec![t(10, 0), t(11, 0)];
        let base_times = vec![
            t(10, 0),
            t(10, 15),
            t(10, 30),
            t(10, 45),
            t(11, 0),
            t(11, 15),
        ];
        let out = align_series(&[1.0, 2.0], &from_times, &base_times, Timeframe::M15).unwrap();
        assert_eq!(out, vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn lower_to_higher_takes_last_in_window() {
        // 5m values onto a 15m axis
        let from_times = vec![t(10, 0), t(10, 5), t(10, 10), t(10, 15), t(10, 20)];
        let base_times = vec![t(10, 0), t(10, 15)];
        let out =
            align_series(&[1.0, 2.0, 3.0, 4.0, 5.0], &from_times, &base_times, Timeframe::M15)
                .unwrap();
        assert_eq!(out, vec![3.0, 5.0]);
    }

    #[test]
    fn nan_before_first_source_bar() {
        let from_times = vec![t(11, 0)];
        let base_times = vec![t(10, 0), t(10, 30), t(11, 0), t(11, 30)];
        let out = align_series(&[7.0], &from_times, &base_times, Timeframe::M30).unwrap();
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(out[2], 7.0);
        assert_eq!(out[3], 7.0);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let err = align_series(&[1.0, 2.0], &[t(10, 0)], &[t(10, 0)], Timeframe::M5).unwrap_err();
        assert!(matches!(err, StratsimError::Alignment { .. }));
    }

    #[test]
    fn output_length_always_matches_base() {
        let from_times = vec![t(10, 0)];
        let base_times: Vec<_> = (0..7).map(|i| t(10, i * 5)).collect();
        let out = align_series(&[9.0], &from_times, &base_times, Timeframe::M5).unwrap();
        assert_eq!(out.len(), base_times.len());
    }
}
