//! In-memory data provider.
//!
//! Holds pre-built candle frames per timeframe for a single symbol. Used by
//! tests and demo runs; the symbol argument of the port is not checked.

use crate::domain::candle::Candle;
use crate::domain::error::StratsimError;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::{align_series, DataProvider};
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryProvider {
    frames: HashMap<Timeframe, Vec<Candle>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(mut self, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        self.frames.insert(timeframe, candles);
        self
    }

    pub fn insert(&mut self, timeframe: Timeframe, candles: Vec<Candle>) {
        self.frames.insert(timeframe, candles);
    }

    fn times(&self, timeframe: Timeframe) -> Result<Vec<chrono::NaiveDateTime>, StratsimError> {
        self.frames
            .get(&timeframe)
            .map(|bars| bars.iter().map(|b| b.time).collect())
            .ok_or_else(|| StratsimError::Alignment {
                reason: format!("no candles loaded at {timeframe}"),
            })
    }
}

impl DataProvider for MemoryProvider {
    fn load_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>, StratsimError> {
        self.frames
            .get(&timeframe)
            .cloned()
            .ok_or_else(|| StratsimError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            })
    }

    fn align_to(
        &self,
        base_tf: Timeframe,
        series: &[f64],
        from_tf: Timeframe,
    ) -> Result<Vec<f64>, StratsimError> {
        let from_times = self.times(from_tf)?;
        let base_times = self.times(base_tf)?;
        align_series(series, &from_times, &base_times, base_tf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(times_min: &[i64], closes: &[f64]) -> Vec<Candle> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        times_min
            .iter()
            .zip(closes)
            .map(|(&m, &close)| Candle {
                time: start + chrono::Duration::minutes(m),
                open: close,
                high: close,
                low: close,
                close,
                volume: 100.0,
            })
            .collect()
    }

    #[test]
    fn load_returns_stored_frame() {
        let provider =
            MemoryProvider::new().with_frame(Timeframe::M5, bars(&[0, 5, 10], &[1.0, 2.0, 3.0]));
        let candles = provider.load_ohlcv("X", Timeframe::M5).unwrap();
        assert_eq!(candles.len(), 3);
    }

    #[test]
    fn load_missing_timeframe_is_no_data() {
        let provider = MemoryProvider::new();
        let err = provider.load_ohlcv("X", Timeframe::M5).unwrap_err();
        assert!(matches!(err, StratsimError::NoData { .. }));
    }

    #[test]
    fn align_uses_stored_axes() {
        let provider = MemoryProvider::new()
            .with_frame(Timeframe::M5, bars(&[0, 5, 10, 15, 20, 25], &[0.0; 6]))
            .with_frame(Timeframe::M15, bars(&[0, 15], &[0.0; 2]));
        let out = provider
            .align_to(Timeframe::M5, &[10.0, 20.0], Timeframe::M15)
            .unwrap();
        assert_eq!(out, vec![10.0, 10.0, 10.0, 20.0, 20.0, 20.0]);
    }

    #[test]
    fn align_without_frame_fails() {
        let provider = MemoryProvider::new().with_frame(Timeframe::M5, bars(&[0], &[1.0]));
        let err = provider
            .align_to(Timeframe::M5, &[1.0], Timeframe::H1)
            .unwrap_err();
        assert!(matches!(err, StratsimError::Alignment { .. }));
    }
}
