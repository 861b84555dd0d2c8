//! Augmented series snapshot and chart curves.
//!
//! The snapshot is one CSV row per bar:
//! `Date, Open, High, Low, Close, Volume, Signal`, the four return columns and
//! the four cumulative curves. Floats are written in shortest round-trip form
//! so reloading reproduces every value bit for bit (NaN and infinities
//! included).

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::BacktestRun;
use crate::returns::ReturnKind;
use crate::{BacktestError, Bar, Result, Series};

/// One bar with every derived column attached
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AugmentedRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(rename = "Signal")]
    pub signal: u8,
    pub overnight_return: f64,
    pub intraday_return: f64,
    pub close_close_return: f64,
    pub passive_return: f64,
    pub overnight_curve: f64,
    pub intraday_curve: f64,
    pub close_close_curve: f64,
    pub passive_curve: f64,
}

impl AugmentedRow {
    pub fn bar(&self) -> Bar {
        Bar::new(
            self.date,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )
    }

    pub fn return_of(&self, kind: ReturnKind) -> f64 {
        match kind {
            ReturnKind::Overnight => self.overnight_return,
            ReturnKind::Intraday => self.intraday_return,
            ReturnKind::CloseClose => self.close_close_return,
            ReturnKind::Passive => self.passive_return,
        }
    }

    pub fn curve_of(&self, kind: ReturnKind) -> f64 {
        match kind {
            ReturnKind::Overnight => self.overnight_curve,
            ReturnKind::Intraday => self.intraday_curve,
            ReturnKind::CloseClose => self.close_close_curve,
            ReturnKind::Passive => self.passive_curve,
        }
    }
}

/// Attach a run's derived columns to the series it was computed from.
pub fn augment(series: &Series, run: &BacktestRun) -> Result<Vec<AugmentedRow>> {
    if run.len() != series.len() {
        return Err(BacktestError::LengthMismatch {
            column: "run",
            expected: series.len(),
            got: run.len(),
        });
    }

    let r = &run.returns;
    let c = &run.curves;
    Ok(series
        .bars()
        .iter()
        .enumerate()
        .map(|(i, b)| AugmentedRow {
            date: b.date,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: b.volume,
            signal: run.signal.get(i),
            overnight_return: r.overnight[i],
            intraday_return: r.intraday[i],
            close_close_return: r.close_close[i],
            passive_return: r.passive[i],
            overnight_curve: c.overnight[i],
            intraday_curve: c.intraday[i],
            close_close_curve: c.close_close[i],
            passive_curve: c.passive[i],
        })
        .collect())
}

/// Write rows as CSV, header first.
pub fn write_csv(path: &Path, rows: &[AugmentedRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = rows.len(), "wrote augmented series");
    Ok(())
}

/// Reload a snapshot written by [`write_csv`].
pub fn read_csv(path: &Path) -> Result<Vec<AugmentedRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

// ============================================================
// CHART CURVES
// ============================================================

/// The four cumulative curves against date, ready for an external plotter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveSet {
    pub symbol: String,
    pub dates: Vec<NaiveDate>,
    pub curves: Vec<(ReturnKind, Vec<f64>)>,
}

impl CurveSet {
    pub fn from_rows(symbol: impl Into<String>, rows: &[AugmentedRow]) -> Self {
        Self {
            symbol: symbol.into(),
            dates: rows.iter().map(|r| r.date).collect(),
            curves: ReturnKind::ALL
                .iter()
                .map(|&k| (k, rows.iter().map(|r| r.curve_of(k)).collect()))
                .collect(),
        }
    }

    pub fn title(&self) -> String {
        format!("P&L Cumulative Sum Curves - Ticker: {}", self.symbol)
    }

    /// Curve by kind, with its legend label.
    pub fn curve(&self, kind: ReturnKind) -> Option<(&'static str, &[f64])> {
        self.curves
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(k, v)| (k.curve_column(), v.as_slice()))
    }
}
