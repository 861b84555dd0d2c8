//! Indicator snapshots across a basket of instruments.
//!
//! Rolling windows follow the usual convention: the first `period - 1` values
//! of a rolling mean are NaN, as is any window holding a NaN or infinite input.

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::source::SeriesSource;
use crate::{BacktestError, Result, OHLCV};

pub const ATR_PERIOD: usize = 14;
pub const RSI_PERIOD: usize = 14;
pub const SMA_PERIODS: [usize; 3] = [20, 50, 200];

// ============================================================
// ROLLING PRIMITIVES
// ============================================================

fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let len = values.len();
    let mut result = vec![f64::NAN; len];
    if period == 0 || len < period {
        return result;
    }

    // Finite inputs go into the sum; non-finite ones are only counted so the
    // window recovers once they drop out.
    let mut sum = 0.0;
    let mut non_finite = 0usize;
    for (i, &value) in values.iter().enumerate() {
        if value.is_finite() {
            sum += value;
        } else {
            non_finite += 1;
        }
        if i >= period {
            let old = values[i - period];
            if old.is_finite() {
                sum -= old;
            } else {
                non_finite -= 1;
            }
        }
        if i + 1 >= period && non_finite == 0 {
            result[i] = sum / period as f64;
        }
    }
    result
}

/// True range per bar. The first bar has no previous close and uses high - low.
pub fn true_range<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let hl = bar.high() - bar.low();
            match i.checked_sub(1).map(|p| bars[p].close()) {
                Some(prev) => {
                    let gap_up = (bar.high() - prev).abs();
                    let gap_down = (bar.low() - prev).abs();
                    hl.max(gap_up).max(gap_down)
                }
                None => hl,
            }
        })
        .collect()
}

/// Simple rolling mean of the true range.
pub fn atr<T: OHLCV>(bars: &[T], period: usize) -> Vec<f64> {
    rolling_mean(&true_range(bars), period)
}

/// Simple moving average of closes.
pub fn sma(closes: &[f64], period: usize) -> Vec<f64> {
    rolling_mean(closes, period)
}

/// RSI from simple rolling means of gains and losses.
///
/// The first bar has no change and contributes a zero gain and loss. A window
/// with no losses gives 100; a flat window gives NaN.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut gains = vec![0.0; closes.len()];
    let mut losses = vec![0.0; closes.len()];
    for i in 1..closes.len() {
        let delta = closes[i] - closes[i - 1];
        if delta > 0.0 {
            gains[i] = delta;
        } else if delta < 0.0 {
            losses[i] = -delta;
        }
    }

    rolling_mean(&gains, period)
        .into_iter()
        .zip(rolling_mean(&losses, period))
        .map(|(g, l)| 100.0 - 100.0 / (1.0 + g / l))
        .collect()
}

/// Percent distance of `price` from `reference`.
#[inline]
pub fn percent_difference(price: f64, reference: f64) -> f64 {
    (price - reference) / reference * 100.0
}

#[inline]
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn last(values: &[f64]) -> f64 {
    values.last().copied().unwrap_or(f64::NAN)
}

// ============================================================
// SNAPSHOT
// ============================================================

/// Latest indicator readings for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub atr: f64,
    pub sma20_pct: f64,
    pub sma50_pct: f64,
    pub sma200_pct: f64,
    pub rsi: f64,
    pub current_price: f64,
    pub high_52w: f64,
    pub low_52w: f64,
    pub price_change: f64,
    pub volume: f64,
}

impl IndicatorSnapshot {
    /// Compute readings at the last bar. Needs a previous close for the
    /// price change. Windows longer than the history yield NaN.
    pub fn compute<T: OHLCV>(symbol: impl Into<String>, bars: &[T]) -> Result<Self> {
        if bars.len() < 2 {
            return Err(BacktestError::InsufficientData {
                need: 2,
                got: bars.len(),
            });
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
        let current_price = round2(closes[closes.len() - 1]);
        let prev_close = closes[closes.len() - 2];
        let sma_pct = |period| percent_difference(current_price, last(&sma(&closes, period)));
        let [sma20, sma50, sma200] = SMA_PERIODS.map(sma_pct);

        let highs = bars.iter().map(|b| b.high());
        let lows = bars.iter().map(|b| b.low());
        let high_52w = highs.fold(f64::NEG_INFINITY, f64::max);
        let low_52w = lows.fold(f64::INFINITY, f64::min);

        Ok(Self {
            symbol: symbol.into(),
            atr: round2(last(&atr(bars, ATR_PERIOD))),
            sma20_pct: sma20,
            sma50_pct: sma50,
            sma200_pct: sma200,
            rsi: round2(last(&rsi(&closes, RSI_PERIOD))),
            current_price,
            high_52w: round2(high_52w),
            low_52w: round2(low_52w),
            price_change: round2(current_price - prev_close),
            volume: round2(bars[bars.len() - 1].volume()),
        })
    }
}

impl fmt::Display for IndicatorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<10} {:>10.2} {:>8.2}% {:>8.2}% {:>8.2}% {:>7.2} {:>12.2} {:>12.2} {:>12.2} {:>10.2} {:>16.0}",
            self.symbol,
            self.atr,
            self.sma20_pct,
            self.sma50_pct,
            self.sma200_pct,
            self.rsi,
            self.current_price,
            self.high_52w,
            self.low_52w,
            self.price_change,
            self.volume,
        )
    }
}

/// Column header matching the [`IndicatorSnapshot`] `Display` layout.
pub fn table_header() -> String {
    format!(
        "{:<10} {:>10} {:>9} {:>9} {:>9} {:>7} {:>12} {:>12} {:>12} {:>10} {:>16}",
        "Ticker",
        "ATR",
        "SMA20",
        "SMA50",
        "SMA200",
        "RSI",
        "Price",
        "52W High",
        "52W Low",
        "Change",
        "Volume",
    )
}

// ============================================================
// PARALLEL BASKET SCAN
// ============================================================

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: BacktestError,
}

/// Fetch and snapshot every symbol in parallel. Results keep the input order;
/// a failing symbol does not stop the others.
pub fn scan_basket<S, I>(
    source: &S,
    symbols: I,
    start: NaiveDate,
    end: NaiveDate,
) -> (Vec<IndicatorSnapshot>, Vec<ScanError>)
where
    S: SeriesSource + ?Sized,
    I: IntoParallelIterator,
    I::Item: AsRef<str>,
{
    let results: Vec<_> = symbols
        .into_par_iter()
        .map(|symbol| {
            let symbol = symbol.as_ref();
            source
                .fetch(symbol, start, end)
                .and_then(|series| IndicatorSnapshot::compute(symbol, series.bars()))
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => {
                warn!(symbol = %e.symbol, error = %e.error, "scan failed");
                errors.push(e)
            }
        }
    }
    info!(
        ok = successes.len(),
        failed = errors.len(),
        "basket scan done"
    );

    (successes, errors)
}

/// Persist snapshots as CSV.
pub fn write_snapshots_csv(path: &Path, snapshots: &[IndicatorSnapshot]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for snapshot in snapshots {
        writer.serialize(snapshot)?;
    }
    writer.flush()?;
    Ok(())
}
