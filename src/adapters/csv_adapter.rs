//! CSV file data adapter.
//!
//! One file per symbol and timeframe, named `{symbol}_{timeframe}.csv`, with
//! a `time,open,high,low,close,volume` header and timestamps formatted
//! `%Y-%m-%d %H:%M:%S`. The provider is scoped to the request's date window:
//! rows outside it are dropped on load. Loaded bar-time axes are remembered
//! so `align_to` can resample between any two timeframes it has served.

use crate::domain::candle::Candle;
use crate::domain::error::StratsimError;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::{align_series, DataProvider};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

pub struct CsvProvider {
    base_path: PathBuf,
    window: Option<(NaiveDateTime, NaiveDateTime)>,
    axes: Mutex<HashMap<Timeframe, Vec<NaiveDateTime>>>,
}

impl CsvProvider {
    pub fn new(base_path: PathBuf) -> Self {
        CsvProvider {
            base_path,
            window: None,
            axes: Mutex::new(HashMap::new()),
        }
    }

    /// Restrict loads to `[start, end]` inclusive.
    pub fn with_window(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.window = Some((start, end));
        self
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{symbol}_{timeframe}.csv"))
    }

    fn data_err(reason: String) -> StratsimError {
        StratsimError::DataProvider { reason }
    }

    fn field<'r>(record: &'r csv::StringRecord, idx: usize, name: &str) -> Result<&'r str, StratsimError> {
        record
            .get(idx)
            .ok_or_else(|| Self::data_err(format!("missing {name} column")))
    }

    fn num_field(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64, StratsimError> {
        Self::field(record, idx, name)?
            .trim()
            .parse()
            .map_err(|e| Self::data_err(format!("invalid {name} value: {e}")))
    }
}

impl DataProvider for CsvProvider {
    fn load_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>, StratsimError> {
        let path = self.csv_path(symbol, timeframe);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Self::data_err(format!("failed to read {}: {e}", path.display())))?;

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| Self::data_err(format!("CSV parse error: {e}")))?;

            let time_str = Self::field(&record, 0, "time")?;
            let time = NaiveDateTime::parse_from_str(time_str.trim(), "%Y-%m-%d %H:%M:%S")
                .map_err(|e| Self::data_err(format!("invalid time format: {e}")))?;
            if let Some((start, end)) = self.window {
                if time < start || time > end {
                    continue;
                }
            }

            bars.push(Candle {
                time,
                open: Self::num_field(&record, 1, "open")?,
                high: Self::num_field(&record, 2, "high")?,
                low: Self::num_field(&record, 3, "low")?,
                close: Self::num_field(&record, 4, "close")?,
                volume: Self::num_field(&record, 5, "volume")?,
            });
        }
        bars.sort_by_key(|b| b.time);

        if let Ok(mut axes) = self.axes.lock() {
            axes.insert(timeframe, bars.iter().map(|b| b.time).collect());
        }
        Ok(bars)
    }

    fn align_to(
        &self,
        base_tf: Timeframe,
        series: &[f64],
        from_tf: Timeframe,
    ) -> Result<Vec<f64>, StratsimError> {
        let axes = self.axes.lock().map_err(|_| StratsimError::Alignment {
            reason: "axis cache poisoned".to_string(),
        })?;
        let from_times = axes.get(&from_tf).ok_or_else(|| StratsimError::Alignment {
            reason: format!("no candles loaded at {from_tf}"),
        })?;
        let base_times = axes.get(&base_tf).ok_or_else(|| StratsimError::Alignment {
            reason: format!("no candles loaded at {base_tf}"),
        })?;
        align_series(series, from_times, base_times, base_tf)
    }
}
