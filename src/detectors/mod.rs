//! Candlestick pattern detectors
//!
//! A detector inspects one bar (plus whatever context it declares through
//! [`PatternDetector::lookback`] / [`PatternDetector::lookahead`]) and the
//! default [`PatternDetector::scan`] turns that into an aligned [`Signal`].

pub mod helpers;
pub mod signal;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod single_bar;

pub use helpers::*;
pub use signal::Signal;
pub use single_bar::*;

use crate::{PatternId, PatternMatch, OHLCV};

/// Pattern detector over a slice of bars
pub trait PatternDetector: Send + Sync {
    fn id(&self) -> PatternId;

    /// Bars required before `index` for the rule to be evaluated.
    fn lookback(&self) -> usize;

    /// Bars required after `index` for the rule to be evaluated.
    fn lookahead(&self) -> usize;

    /// Evaluate the rule at `index`. Callers guarantee the context window.
    fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch>;

    /// Single forward pass writing a freshly allocated signal. Bars outside
    /// `lookback..len - lookahead` stay 0.
    fn scan<T: OHLCV>(&self, bars: &[T]) -> Signal {
        let mut signal = Signal::zeros(bars.len());
        let end = bars.len().saturating_sub(self.lookahead());
        for i in self.lookback()..end {
            if self.detect_at(bars, i).is_some() {
                signal.set(i);
            }
        }
        signal
    }
}
