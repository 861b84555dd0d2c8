//! Trade metrics for the pattern strategy and the passive baseline.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detectors::Signal;
use crate::returns::NonFinitePolicy;
use crate::{BacktestError, Result};

/// Summary of one strategy over a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeMetrics {
    pub trade_count: usize,
    pub average_pnl: f64,
    pub total_pnl: f64,
}

impl TradeMetrics {
    /// Average is 0 when there are no trades.
    pub fn from_total(trade_count: usize, total_pnl: f64) -> Self {
        let average_pnl = if trade_count > 0 {
            total_pnl / trade_count as f64
        } else {
            0.0
        };
        Self {
            trade_count,
            average_pnl,
            total_pnl,
        }
    }
}

/// Pattern metrics next to the buy-and-hold baseline
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub pattern: TradeMetrics,
    pub passive: TradeMetrics,
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pattern P&L Metrics:")?;
        writeln!(f, "Total Pattern Trades: {}", self.pattern.trade_count)?;
        writeln!(f, "Average Pattern P&L: {}", self.pattern.average_pnl)?;
        writeln!(f, "Total Pattern P&L: {}", self.pattern.total_pnl)?;
        writeln!(f)?;
        writeln!(f, "Passive P&L Metrics:")?;
        writeln!(f, "Total Passive Trades: {}", self.passive.trade_count)?;
        writeln!(f, "Average Passive P&L: {}", self.passive.average_pnl)?;
        write!(f, "Total Passive P&L: {}", self.passive.total_pnl)
    }
}

/// Metrics together with the wall-clock time of the run that produced them
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedReport {
    #[serde(flatten)]
    pub metrics: MetricsReport,
    pub execution_time_ms: f64,
}

impl TimedReport {
    pub fn new(metrics: MetricsReport, elapsed: Duration) -> Self {
        Self {
            metrics,
            execution_time_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }
}

impl fmt::Display for TimedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.metrics)?;
        write!(f, "\nExecution Time: {:.2} ms", self.execution_time_ms)
    }
}

/// Reduce a run to its two metric records.
///
/// Every fired signal counts as one pattern trade and its P&L is the overnight
/// column. Every bar counts as one passive trade.
pub fn aggregate(
    signal: &Signal,
    overnight: &[f64],
    passive: &[f64],
    policy: NonFinitePolicy,
) -> Result<MetricsReport> {
    let len = signal.len();
    for (column, got) in [("overnight", overnight.len()), ("passive", passive.len())] {
        if got != len {
            return Err(BacktestError::LengthMismatch {
                column,
                expected: len,
                got,
            });
        }
    }

    Ok(MetricsReport {
        pattern: TradeMetrics::from_total(signal.fired_count(), policy.sum(overnight)),
        passive: TradeMetrics::from_total(len, policy.sum(passive)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_trades_average_is_zero() {
        let m = TradeMetrics::from_total(0, 0.0);
        assert_eq!(m.average_pnl, 0.0);

        let report = aggregate(
            &Signal::zeros(4),
            &[f64::NAN, 0.0, 0.0, 0.0],
            &[f64::NAN, 0.1, -0.05, 0.02],
            NonFinitePolicy::Skip,
        )
        .unwrap();
        assert_eq!(report.pattern.trade_count, 0);
        assert_eq!(report.pattern.average_pnl, 0.0);
        assert_eq!(report.pattern.total_pnl, 0.0);
        assert_eq!(report.passive.trade_count, 4);
        assert!((report.passive.total_pnl - 0.07).abs() < 1e-12);
        assert!((report.passive.average_pnl - 0.0175).abs() < 1e-12);
    }

    #[test]
    fn test_empty_series() {
        let report = aggregate(&Signal::zeros(0), &[], &[], NonFinitePolicy::Skip).unwrap();
        assert_eq!(report, MetricsReport::default());
    }

    #[test]
    fn test_pattern_totals() {
        let signal = Signal::from(vec![0, 1, 0, 1, 0]);
        let overnight = [f64::NAN, 0.0, 0.02, 0.0, -0.01];
        let passive = [f64::NAN, 0.01, 0.02, 0.03, -0.01];
        let report = aggregate(&signal, &overnight, &passive, NonFinitePolicy::Skip).unwrap();
        assert_eq!(report.pattern.trade_count, 2);
        assert!((report.pattern.total_pnl - 0.01).abs() < 1e-12);
        assert!((report.pattern.average_pnl - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_policies() {
        let signal = Signal::from(vec![1, 0, 0]);
        let overnight = [f64::NAN, f64::INFINITY, 0.0];
        let passive = [f64::NAN, f64::INFINITY, 0.5];

        let skip = aggregate(&signal, &overnight, &passive, NonFinitePolicy::Skip).unwrap();
        assert_eq!(skip.pattern.total_pnl, 0.0);
        assert!((skip.passive.total_pnl - 0.5).abs() < 1e-12);

        let prop = aggregate(&signal, &overnight, &passive, NonFinitePolicy::Propagate).unwrap();
        assert!(prop.pattern.total_pnl.is_infinite());
        assert!(prop.passive.total_pnl.is_infinite());
    }

    #[test]
    fn test_misaligned_columns() {
        let signal = Signal::zeros(3);
        let result = aggregate(&signal, &[0.0; 2], &[0.0; 3], NonFinitePolicy::Skip);
        let msg = result.unwrap_err().to_string();
        assert_eq!(msg, "Column overnight has 2 rows, series has 3");
    }

    #[test]
    fn test_display() {
        let report = MetricsReport {
            pattern: TradeMetrics::from_total(2, 0.5),
            passive: TradeMetrics::from_total(4, 1.0),
        };
        let text = report.to_string();
        assert!(text.contains("Total Pattern Trades: 2"));
        assert!(text.contains("Average Pattern P&L: 0.25"));
        assert!(text.contains("Total Passive Trades: 4"));
    }

    #[test]
    fn test_timed_report_json_carries_execution_time() {
        let metrics = MetricsReport {
            pattern: TradeMetrics::from_total(1, 0.5),
            passive: TradeMetrics::from_total(2, 1.0),
        };
        let timed = TimedReport::new(metrics, Duration::from_millis(250));

        let json: serde_json::Value = serde_json::to_value(timed).unwrap();
        assert_eq!(json["execution_time_ms"], 250.0);
        assert_eq!(json["pattern"]["trade_count"], 1);
        assert_eq!(json["passive"]["total_pnl"], 1.0);

        let text = timed.to_string();
        assert!(text.starts_with("Pattern P&L Metrics:"));
        assert!(text.ends_with("Execution Time: 250.00 ms"));
    }
}
