//! Shadow geometry shared by the hammer-family detectors
//!
//! These measure shadows from a named side of the body rather than from
//! `max(open, close)` / `min(open, close)`, so a rule can compare against
//! both ends of the body explicitly.

use crate::OHLCV;

/// Context bars kept on each side of a hammer candidate.
pub const HAMMER_MARGIN: usize = 2;

/// Low prints below both open and close.
#[inline]
pub fn has_lower_shadow<T: OHLCV>(bar: &T) -> bool {
    bar.low() < bar.open() && bar.low() < bar.close()
}

/// Distance from the open down to the low.
#[inline]
pub fn lower_shadow_from_open<T: OHLCV>(bar: &T) -> f64 {
    bar.open() - bar.low()
}

/// Distance from the open up to the high.
#[inline]
pub fn upper_shadow_from_open<T: OHLCV>(bar: &T) -> f64 {
    bar.high() - bar.open()
}

/// Distance from the close up to the high.
#[inline]
pub fn upper_shadow_from_close<T: OHLCV>(bar: &T) -> f64 {
    bar.high() - bar.close()
}
