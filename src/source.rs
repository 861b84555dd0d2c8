//! Where series come from.
//!
//! The [`SeriesSource`] trait abstracts over providers so the pipeline can run
//! against local CSV exports or in-memory fixtures. Failures are returned to
//! the caller as-is; a source never retries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::{BacktestError, Bar, Result, Series};

/// Supplies a date-ordered OHLCV series for one symbol over `[start, end]`.
pub trait SeriesSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Series>;
}

// ============================================================
// CSV DIRECTORY
// ============================================================

/// One row of a downloaded daily history file. Extra columns such as
/// `Adj Close` are ignored.
#[derive(Debug, Deserialize)]
struct CsvBar {
    #[serde(rename = "Date", alias = "date")]
    date: NaiveDate,
    #[serde(rename = "Open", alias = "open")]
    open: f64,
    #[serde(rename = "High", alias = "high")]
    high: f64,
    #[serde(rename = "Low", alias = "low")]
    low: f64,
    #[serde(rename = "Close", alias = "close")]
    close: f64,
    #[serde(rename = "Volume", alias = "volume", default)]
    volume: f64,
}

impl From<CsvBar> for Bar {
    fn from(r: CsvBar) -> Self {
        Bar::new(r.date, r.open, r.high, r.low, r.close, r.volume)
    }
}

/// Reads `{dir}/{SYMBOL}.csv` files with a `Date,Open,High,Low,Close,Volume` header.
#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the history file for `symbol`.
    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Parse every row of a history file, in file order.
    pub fn read_bars(path: &Path) -> Result<Vec<Bar>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut bars = Vec::new();
        for row in reader.deserialize::<CsvBar>() {
            bars.push(row?.into());
        }
        Ok(bars)
    }
}

impl SeriesSource for CsvDirSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Series> {
        let path = self.path_for(symbol);
        let fail = |reason: String| BacktestError::Source {
            symbol: symbol.to_string(),
            reason,
        };
        if !path.exists() {
            return Err(fail(format!("no history file at {}", path.display())));
        }

        let bars: Vec<Bar> = Self::read_bars(&path)
            .map_err(|e| fail(e.to_string()))?
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect();
        debug!(symbol, path = %path.display(), bars = bars.len(), "loaded history");

        Series::sorted(symbol, bars).map_err(|e| fail(e.to_string()))
    }
}

// ============================================================
// IN-MEMORY
// ============================================================

/// Fixed set of series keyed by symbol
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    series: HashMap<String, Vec<Bar>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        self.series.insert(symbol.into(), bars);
        self
    }
}

impl SeriesSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Series> {
        let bars = self
            .series
            .get(symbol)
            .ok_or_else(|| BacktestError::Source {
                symbol: symbol.to_string(),
                reason: "unknown symbol".into(),
            })?
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .copied()
            .collect();
        Series::sorted(symbol, bars)
    }
}
