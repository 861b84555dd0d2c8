//! Next-bar return attribution for a pattern signal
//!
//! Every gated return at bar `i` is switched by the signal at `i - SIGNAL_LAG`:
//! a pattern confirmed on a close can only be traded from the following bar.
//! The first [`UNDEFINED_LEADING_BARS`] bars have no previous close and are
//! always NaN in a [`ReturnSeries`].

use serde::{Deserialize, Serialize};

use crate::detectors::Signal;
use crate::{BacktestError, Result, OHLCV};

/// Offset between the bar a signal fires on and the bar whose return it earns.
pub const SIGNAL_LAG: usize = 1;

/// Bars at the start of a series whose returns are undefined (no previous close).
pub const UNDEFINED_LEADING_BARS: usize = 1;

// ============================================================
// RETURN KINDS
// ============================================================

/// The four per-bar return conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    /// previous close -> open, gated
    Overnight,
    /// open -> close, gated
    Intraday,
    /// previous close -> close, gated
    CloseClose,
    /// previous close -> close, always on (buy-and-hold baseline)
    Passive,
}

impl ReturnKind {
    pub const ALL: [ReturnKind; 4] = [
        ReturnKind::Overnight,
        ReturnKind::Intraday,
        ReturnKind::CloseClose,
        ReturnKind::Passive,
    ];

    /// Column name of the per-bar return
    pub fn column(self) -> &'static str {
        match self {
            ReturnKind::Overnight => "overnight_return",
            ReturnKind::Intraday => "intraday_return",
            ReturnKind::CloseClose => "close_close_return",
            ReturnKind::Passive => "passive_return",
        }
    }

    /// Column name of the cumulative curve
    pub fn curve_column(self) -> &'static str {
        match self {
            ReturnKind::Overnight => "overnight_curve",
            ReturnKind::Intraday => "intraday_curve",
            ReturnKind::CloseClose => "close_close_curve",
            ReturnKind::Passive => "passive_curve",
        }
    }

    #[inline]
    pub fn is_gated(self) -> bool {
        !matches!(self, ReturnKind::Passive)
    }

    /// Raw (ungated) return at `i`; `i >= 1`.
    #[inline]
    fn raw<T: OHLCV>(self, bars: &[T], i: usize) -> f64 {
        let prev = bars[i - 1].close();
        let bar = &bars[i];
        match self {
            ReturnKind::Overnight => (bar.open() - prev) / prev,
            ReturnKind::Intraday => (bar.close() - bar.open()) / bar.open(),
            ReturnKind::CloseClose | ReturnKind::Passive => (bar.close() - prev) / prev,
        }
    }
}

// ============================================================
// NON-FINITE POLICY
// ============================================================

/// What summations do with a NaN or infinite per-bar return.
///
/// Per-bar values are never rewritten; the policy only affects cumulative
/// curves and metric totals. The undefined leading bar contributes 0 under
/// either policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonFinitePolicy {
    /// Non-finite entries contribute 0.
    #[default]
    Skip,
    /// Non-finite entries are added as-is and poison every later value.
    Propagate,
}

impl NonFinitePolicy {
    /// Contribution of `value` at `index` to a running total.
    #[inline]
    pub fn contribution(self, index: usize, value: f64) -> f64 {
        if index < UNDEFINED_LEADING_BARS {
            return 0.0;
        }
        match self {
            NonFinitePolicy::Skip if !value.is_finite() => 0.0,
            _ => value,
        }
    }

    /// Sum a return column under this policy.
    pub fn sum(self, values: &[f64]) -> f64 {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| self.contribution(i, v))
            .sum()
    }
}

impl std::str::FromStr for NonFinitePolicy {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(NonFinitePolicy::Skip),
            "propagate" => Ok(NonFinitePolicy::Propagate),
            _ => Err(BacktestError::InvalidConfig(format!(
                "unknown non-finite policy '{s}' (expected skip or propagate)"
            ))),
        }
    }
}

/// Running total; position `i` holds the sum of contributions `0..=i`.
pub fn cumulative_sum(values: &[f64], policy: NonFinitePolicy) -> Vec<f64> {
    let mut total = 0.0;
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            total += policy.contribution(i, v);
            total
        })
        .collect()
}

// ============================================================
// RETURN SERIES
// ============================================================

/// Four per-bar return columns, index-aligned with the series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub overnight: Vec<f64>,
    pub intraday: Vec<f64>,
    pub close_close: Vec<f64>,
    pub passive: Vec<f64>,
}

impl ReturnSeries {
    pub fn get(&self, kind: ReturnKind) -> &[f64] {
        match kind {
            ReturnKind::Overnight => &self.overnight,
            ReturnKind::Intraday => &self.intraday,
            ReturnKind::CloseClose => &self.close_close,
            ReturnKind::Passive => &self.passive,
        }
    }

    fn get_mut(&mut self, kind: ReturnKind) -> &mut Vec<f64> {
        match kind {
            ReturnKind::Overnight => &mut self.overnight,
            ReturnKind::Intraday => &mut self.intraday,
            ReturnKind::CloseClose => &mut self.close_close,
            ReturnKind::Passive => &mut self.passive,
        }
    }

    pub fn len(&self) -> usize {
        self.passive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passive.is_empty()
    }

    /// Bars (after the leading undefined one) holding a non-finite value in any column.
    pub fn non_finite_indices(&self) -> Vec<usize> {
        let finite_at = |i: usize| ReturnKind::ALL.iter().all(|&k| self.get(k)[i].is_finite());
        (UNDEFINED_LEADING_BARS..self.len())
            .filter(|&i| !finite_at(i))
            .collect()
    }

    /// Cumulative curves for all four columns.
    pub fn cumulative(&self, policy: NonFinitePolicy) -> CumulativeCurves {
        CumulativeCurves {
            overnight: cumulative_sum(&self.overnight, policy),
            intraday: cumulative_sum(&self.intraday, policy),
            close_close: cumulative_sum(&self.close_close, policy),
            passive: cumulative_sum(&self.passive, policy),
        }
    }
}

/// Running totals of a [`ReturnSeries`], one per [`ReturnKind`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CumulativeCurves {
    pub overnight: Vec<f64>,
    pub intraday: Vec<f64>,
    pub close_close: Vec<f64>,
    pub passive: Vec<f64>,
}

impl CumulativeCurves {
    pub fn get(&self, kind: ReturnKind) -> &[f64] {
        match kind {
            ReturnKind::Overnight => &self.overnight,
            ReturnKind::Intraday => &self.intraday,
            ReturnKind::CloseClose => &self.close_close,
            ReturnKind::Passive => &self.passive,
        }
    }

    /// Final value of each curve, 0 for an empty series.
    pub fn last(&self, kind: ReturnKind) -> f64 {
        self.get(kind).last().copied().unwrap_or(0.0)
    }
}

// ============================================================
// ATTRIBUTION
// ============================================================

/// Compute the four return columns for `bars` gated by `signal`.
///
/// A gated return is exactly 0 whenever the lagged signal is 0, even when the
/// price ratio itself would divide by zero. Zero prices on an active bar give
/// a non-finite value that is kept.
pub fn attribute<T: OHLCV>(bars: &[T], signal: &Signal) -> Result<ReturnSeries> {
    if signal.len() != bars.len() {
        return Err(BacktestError::LengthMismatch {
            column: "signal",
            expected: bars.len(),
            got: signal.len(),
        });
    }

    let traded = |i: usize| i.checked_sub(SIGNAL_LAG).is_some_and(|p| signal.is_set(p));

    let mut returns = ReturnSeries::default();
    for kind in ReturnKind::ALL {
        let column = returns.get_mut(kind);
        column.reserve(bars.len());
        for i in 0..bars.len() {
            let value = if i < UNDEFINED_LEADING_BARS {
                f64::NAN
            } else if kind.is_gated() && !traded(i) {
                0.0
            } else {
                kind.raw(bars, i)
            };
            column.push(value);
        }
    }
    Ok(returns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;
    use chrono::{Days, NaiveDate};

    fn bars(prices: &[(f64, f64)]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &(o, c))| {
                let date = start + Days::new(i as u64);
                Bar::new(date, o, o.max(c) + 1.0, o.min(c) - 1.0, c, 0.0)
            })
            .collect()
    }

    #[test]
    fn test_index_zero_is_undefined() {
        let b = bars(&[(10.0, 11.0), (11.0, 12.0)]);
        let r = attribute(&b, &Signal::from(vec![1, 0])).unwrap();
        for kind in ReturnKind::ALL {
            assert!(r.get(kind)[0].is_nan());
        }
    }

    #[test]
    fn test_gating_uses_previous_signal() {
        let b = bars(&[(10.0, 10.0), (11.0, 12.0), (12.0, 15.0)]);
        // Signal on bar 1 only: bar 2 is the traded bar, bar 1 is not.
        let r = attribute(&b, &Signal::from(vec![0, 1, 0])).unwrap();

        assert_eq!(r.overnight[1], 0.0);
        assert_eq!(r.intraday[1], 0.0);
        assert_eq!(r.close_close[1], 0.0);

        assert!((r.overnight[2] - 0.0).abs() < 1e-12); // 12 -> 12
        assert!((r.intraday[2] - 0.25).abs() < 1e-12); // 12 -> 15
        assert!((r.close_close[2] - 0.25).abs() < 1e-12);

        assert!((r.passive[1] - 0.2).abs() < 1e-12);
        assert!((r.passive[2] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_previous_close_is_adjacent_bar() {
        // 10 -> 20 -> 40 closes; bar 2 is gated on by the signal at bar 1
        let b = bars(&[(10.0, 10.0), (20.0, 20.0), (30.0, 40.0)]);
        let r = attribute(&b, &Signal::from(vec![0, 1, 0])).unwrap();
        assert!((r.overnight[2] - 0.5).abs() < 1e-12);
        assert!((r.close_close[2] - 1.0).abs() < 1e-12);
        assert!((r.passive[1] - 1.0).abs() < 1e-12);
        assert!(r.non_finite_indices().is_empty());
    }

    #[test]
    fn test_length_mismatch() {
        let b = bars(&[(10.0, 10.0), (11.0, 12.0)]);
        let err = attribute(&b, &Signal::zeros(3)).unwrap_err();
        assert_eq!(err.to_string(), "Column signal has 3 rows, series has 2");
    }

    #[test]
    fn test_zero_close_propagates_non_finite() {
        let b = bars(&[(1.0, 0.0), (1.0, 2.0), (2.0, 2.0)]);
        let r = attribute(&b, &Signal::from(vec![1, 0, 0])).unwrap();
        assert!(r.overnight[1].is_infinite());
        assert!(r.close_close[1].is_infinite());
        assert!(r.passive[1].is_infinite());
        // open is non-zero so intraday is fine
        assert!((r.intraday[1] - 1.0).abs() < 1e-12);
        assert_eq!(r.non_finite_indices(), vec![1]);
    }

    #[test]
    fn test_zero_close_without_signal_stays_zero() {
        let b = bars(&[(1.0, 0.0), (1.0, 2.0)]);
        let r = attribute(&b, &Signal::zeros(2)).unwrap();
        assert_eq!(r.overnight[1], 0.0);
        assert_eq!(r.close_close[1], 0.0);
        assert!(r.passive[1].is_infinite());
    }

    #[test]
    fn test_cumulative_skip() {
        let values = [f64::NAN, 0.1, f64::INFINITY, 0.2, f64::NAN];
        let curve = cumulative_sum(&values, NonFinitePolicy::Skip);
        assert_eq!(curve[0], 0.0);
        assert!((curve[1] - 0.1).abs() < 1e-12);
        assert!((curve[2] - 0.1).abs() < 1e-12);
        assert!((curve[3] - 0.3).abs() < 1e-12);
        assert!((curve[4] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_cumulative_propagate() {
        let values = [f64::NAN, 0.1, f64::INFINITY, 0.2];
        let curve = cumulative_sum(&values, NonFinitePolicy::Propagate);
        assert_eq!(curve[0], 0.0);
        assert!((curve[1] - 0.1).abs() < 1e-12);
        assert!(curve[2].is_infinite());
        assert!(curve[3].is_infinite());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "skip".parse::<NonFinitePolicy>().unwrap(),
            NonFinitePolicy::Skip
        );
        assert_eq!(
            "Propagate".parse::<NonFinitePolicy>().unwrap(),
            NonFinitePolicy::Propagate
        );
        assert!("zero".parse::<NonFinitePolicy>().is_err());
    }

    #[test]
    fn test_column_names_unique() {
        let mut names: Vec<&str> = ReturnKind::ALL
            .iter()
            .flat_map(|k| [k.column(), k.curve_column()])
            .collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 8);
    }
}
