//! Price extremes: 52-week range and all-time high within the history.

use serde::{Deserialize, Serialize};

use super::{finite_values, pct_from_level, tail};

/// Trading days in a year, used as the 52-week window.
pub const WEEKS_52_BARS: usize = 252;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extremes {
    pub high_52w: f64,
    pub low_52w: f64,
    pub all_time_high: f64,
    pub pct_from_52w_high: f64,
    pub pct_from_52w_low: f64,
    pub pct_from_ath: f64,
}

/// Extremes of the close series, measured from `reference` (normally the
/// last close). The 52-week window shrinks to whatever history exists.
pub fn extremes(closes: &[f64], reference: f64) -> Option<Extremes> {
    let finite = finite_values(closes);
    if finite.is_empty() {
        return None;
    }
    let year = tail(&finite, WEEKS_52_BARS);
    let high_52w = year.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let low_52w = year.iter().copied().fold(f64::INFINITY, f64::min);
    let all_time_high = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(Extremes {
        high_52w,
        low_52w,
        all_time_high,
        pct_from_52w_high: pct_from_level(reference, high_52w),
        pct_from_52w_low: pct_from_level(reference, low_52w),
        pct_from_ath: pct_from_level(reference, all_time_high),
    })
}
