//! Single-bar candlestick pattern detectors

use super::helpers::{self, has_lower_shadow, lower_shadow_from_open, upper_shadow_from_close};
use super::PatternDetector;
use crate::{Direction, OHLCVExt, PatternId, PatternMatch, OHLCV};

impl_with_defaults!(HammerDetector);

// ============================================================
// HAMMER
// ============================================================

/// Bearish-bodied hammer: long lower shadow, short upper shadow.
///
/// The rule only looks at bar `i`, but candidates within
/// [`helpers::HAMMER_MARGIN`] bars of either end of the series are never
/// evaluated so the next-bar return attribution always has room.
#[derive(Debug, Clone, Copy)]
pub struct HammerDetector {
    pub margin: usize,
}

impl Default for HammerDetector {
    fn default() -> Self {
        Self {
            margin: helpers::HAMMER_MARGIN,
        }
    }
}

impl HammerDetector {
    /// The shape test on its own, without the boundary guard.
    pub fn is_hammer<T: OHLCV>(bar: &T) -> bool {
        if !has_lower_shadow(bar) {
            return false;
        }
        if !bar.is_bearish() {
            return false;
        }
        // Upper shadow is measured from both ends of the body; both must lose.
        let lower = lower_shadow_from_open(bar);
        lower > helpers::upper_shadow_from_open(bar) && lower > upper_shadow_from_close(bar)
    }
}

impl PatternDetector for HammerDetector {
    fn id(&self) -> PatternId {
        PatternId("HAMMER")
    }

    fn lookback(&self) -> usize {
        self.margin
    }

    fn lookahead(&self) -> usize {
        self.margin
    }

    fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        if !Self::is_hammer(bar) {
            return None;
        }

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bullish,
            index,
        })
    }
}
