//! Backtest engine: detect -> attribute -> cumulate -> aggregate.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::detectors::{HammerDetector, PatternDetector, Signal};
use crate::metrics::{aggregate, MetricsReport};
use crate::returns::{attribute, CumulativeCurves, NonFinitePolicy, ReturnSeries};
use crate::{validate_bars, Result, OHLCV};

// ============================================================
// ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    pub non_finite: NonFinitePolicy,
    pub validate_data: bool,
}

/// Everything derived from one series in one run
#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub signal: Signal,
    pub returns: ReturnSeries,
    pub curves: CumulativeCurves,
    pub metrics: MetricsReport,
    pub elapsed: Duration,
}

impl BacktestRun {
    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }
}

/// Runs one detector over a series and scores its signal
#[derive(Debug, Clone)]
pub struct BacktestEngine<D: PatternDetector = HammerDetector> {
    detector: D,
    config: EngineConfig,
}

impl<D: PatternDetector> BacktestEngine<D> {
    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Full pipeline over `bars`. The input is only read.
    pub fn run<T: OHLCV>(&self, bars: &[T]) -> Result<BacktestRun> {
        let started = Instant::now();
        if self.config.validate_data {
            validate_bars(bars)?;
        }

        let signal = self.detector.scan(bars);
        debug!(
            pattern = %self.detector.id(),
            bars = bars.len(),
            fired = signal.fired_count(),
            "detection done"
        );

        let returns = attribute(bars, &signal)?;
        let non_finite = returns.non_finite_indices();
        if !non_finite.is_empty() {
            warn!(
                count = non_finite.len(),
                first = non_finite[0],
                policy = ?self.config.non_finite,
                "non-finite returns from zero prices"
            );
        }

        let curves = returns.cumulative(self.config.non_finite);
        let metrics = aggregate(
            &signal,
            &returns.overnight,
            &returns.passive,
            self.config.non_finite,
        )?;

        Ok(BacktestRun {
            signal,
            returns,
            curves,
            metrics,
            elapsed: started.elapsed(),
        })
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating BacktestEngine instances
#[derive(Debug, Clone)]
pub struct EngineBuilder<D: PatternDetector = HammerDetector> {
    detector: D,
    config: EngineConfig,
}

impl Default for EngineBuilder<HammerDetector> {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder<HammerDetector> {
    pub fn new() -> Self {
        Self {
            detector: HammerDetector::default(),
            config: EngineConfig::default(),
        }
    }
}

impl<D: PatternDetector> EngineBuilder<D> {
    /// Change detector
    pub fn detector<D2: PatternDetector>(self, detector: D2) -> EngineBuilder<D2> {
        EngineBuilder {
            detector,
            config: self.config,
        }
    }

    /// How non-finite returns enter curves and totals
    pub fn non_finite(mut self, policy: NonFinitePolicy) -> Self {
        self.config.non_finite = policy;
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<BacktestEngine<D>> {
        Ok(BacktestEngine {
            detector: self.detector,
            config: self.config,
        })
    }
}
