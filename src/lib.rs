//! # candlebt - candlestick pattern backtester
//!
//! Detects hammer candles in a daily OHLCV series, attributes the next-bar
//! returns to the signal, and compares the result against buy-and-hold.
//!
//! ## Quick Start
//!
//! ```rust
//! use candlebt::prelude::*;
//! use chrono::NaiveDate;
//!
//! let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
//! let bars = vec![
//!     Bar::new(day(1), 10.0, 10.5, 9.8, 10.2, 1000.0),
//!     Bar::new(day(2), 10.2, 10.6, 10.0, 10.4, 1000.0),
//!     Bar::new(day(3), 10.0, 10.2, 8.5, 9.8, 1000.0), // hammer
//!     Bar::new(day(4), 9.9, 10.3, 9.7, 10.1, 1000.0),
//!     Bar::new(day(5), 10.1, 10.4, 10.0, 10.3, 1000.0),
//!     Bar::new(day(6), 10.3, 10.6, 10.2, 10.5, 1000.0),
//! ];
//!
//! let engine = EngineBuilder::new().build().unwrap();
//! let run = engine.run(&bars).unwrap();
//! assert_eq!(run.signal.as_slice(), &[0, 0, 1, 0, 0, 0]);
//! assert_eq!(run.metrics.pattern.trade_count, 1);
//! ```

pub mod config;
pub mod detectors;
pub mod engine;
pub mod indicators;
pub mod metrics;
pub mod report;
pub mod returns;
pub mod source;

pub mod prelude {
    pub use crate::{
        // Config
        config::{BacktestSection, Config, DataSection, ScanSection},
        // Detectors
        detectors::{HammerDetector, PatternDetector, Signal},
        // Engine
        engine::{BacktestEngine, BacktestRun, EngineBuilder},
        // Indicators
        indicators::{scan_basket, IndicatorSnapshot, ScanError},
        // Metrics
        metrics::{aggregate, MetricsReport, TimedReport, TradeMetrics},
        // Reporting
        report::{augment, read_csv, write_csv, AugmentedRow, CurveSet},
        // Returns
        returns::{
            attribute, cumulative_sum, CumulativeCurves, NonFinitePolicy, ReturnKind, ReturnSeries,
        },
        // Sources
        source::{CsvDirSource, MemorySource, SeriesSource},
        // Errors
        BacktestError,
        // Types
        Bar,
        Direction,
        OHLCVExt,
        PatternId,
        PatternMatch,
        Result,
        Series,
        OHLCV,
    };
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, BacktestError>;

/// Errors that can occur while loading, backtesting or reporting a series
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Bars out of chronological order at index {index}")]
    Unordered { index: usize },

    #[error("Column {column} has {got} rows, series has {expected}")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Data source failed for {symbol}: {reason}")]
    Source { symbol: String, reason: String },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Extension trait with computed properties for OHLCV data.
///
/// Shadow lengths live in [`detectors::helpers`], measured from a named end
/// of the body.
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Validate OHLCV data consistency. Zero prices are allowed.
    fn validate(&self) -> Result<()> {
        let values = [self.open(), self.high(), self.low(), self.close()];
        if values.iter().any(|v| v.is_nan()) {
            return Err(BacktestError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if values.iter().any(|v| v.is_infinite()) {
            return Err(BacktestError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(BacktestError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// BAR / SERIES
// ============================================================

/// One daily observation. Immutable once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Date-ordered bars for one instrument.
///
/// Positional lookback and shift operations rely on the bars being strictly
/// ascending by date, so every constructor enforces it.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    symbol: String,
    bars: Vec<Bar>,
}

impl Series {
    /// Wrap bars that are already in order. Fails on the first bar whose date
    /// is not after its predecessor.
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self> {
        if let Some(index) = bars.windows(2).position(|w| w[1].date <= w[0].date) {
            return Err(BacktestError::Unordered { index: index + 1 });
        }
        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    /// Sort by date first, then validate. Duplicate dates are still rejected.
    pub fn sorted(symbol: impl Into<String>, mut bars: Vec<Bar>) -> Result<Self> {
        bars.sort_by_key(|b| b.date);
        Self::new(symbol, bars)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

// ============================================================
// PATTERN MATCH
// ============================================================

/// Unique identifier for a pattern type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternId(pub &'static str);

impl std::fmt::Display for PatternId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

/// Result of pattern detection at one bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternMatch {
    pub pattern_id: PatternId,
    pub direction: Direction,
    pub index: usize,
}

/// Check every bar and report the first invalid one with its position.
pub fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            BacktestError::InvalidOHLCV { reason, .. } => {
                BacktestError::InvalidOHLCV { index: i, reason }
            }
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_is_bearish() {
        let down = Bar::new(day(1), 105.0, 110.0, 90.0, 100.0, 1.0);
        let up = Bar::new(day(1), 100.0, 110.0, 90.0, 105.0, 1.0);
        let flat = Bar::new(day(1), 100.0, 110.0, 90.0, 100.0, 1.0);
        assert!(down.is_bearish());
        assert!(!up.is_bearish());
        assert!(!flat.is_bearish());
    }

    #[test]
    fn test_validate_allows_zero_prices() {
        let bar = Bar::new(day(1), 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(bar.validate().is_ok());
    }

    #[test]
    fn test_validate_bars_reports_index() {
        let bars = vec![
            Bar::new(day(1), 1.0, 2.0, 0.5, 1.5, 1.0),
            Bar::new(day(2), 1.0, 0.5, 2.0, 1.5, 1.0),
        ];
        match validate_bars(&bars) {
            Err(BacktestError::InvalidOHLCV { index, reason }) => {
                assert_eq!(index, 1);
                assert_eq!(reason, "high < low");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_series_rejects_unordered() {
        let bars = vec![
            Bar::new(day(2), 1.0, 2.0, 0.5, 1.5, 1.0),
            Bar::new(day(1), 1.0, 2.0, 0.5, 1.5, 1.0),
        ];
        assert!(matches!(
            Series::new("X", bars.clone()),
            Err(BacktestError::Unordered { index: 1 })
        ));

        let series = Series::sorted("X", bars).unwrap();
        assert_eq!(series.first_date(), Some(day(1)));
        assert_eq!(series.last_date(), Some(day(2)));
    }

    #[test]
    fn test_series_rejects_duplicate_dates() {
        let bars = vec![
            Bar::new(day(1), 1.0, 2.0, 0.5, 1.5, 1.0),
            Bar::new(day(1), 1.0, 2.0, 0.5, 1.5, 1.0),
        ];
        assert!(Series::sorted("X", bars).is_err());
    }

    #[test]
    fn test_empty_series() {
        let series = Series::new("X", Vec::new()).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.first_date(), None);
    }
}
