//! Swing points and price/indicator divergence.
//!
//! A swing high is a value strictly greater than every value within
//! `lookback` positions on both sides; a swing low is strictly smaller.
//! Fewer than `2 * lookback + 1` values means no swings, and therefore no
//! divergence: short history degrades to "none", never to an error.

use serde::{Deserialize, Serialize};

use crate::domain::DivergenceType;

/// Default number of bars compared on each side of a swing candidate.
pub const DEFAULT_SWING_LOOKBACK: usize = 2;
/// Default window (bars) scanned for divergence.
pub const DEFAULT_DIVERGENCE_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    /// Position within the analysed slice.
    pub index: usize,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Swings {
    pub highs: Vec<SwingPoint>,
    pub lows: Vec<SwingPoint>,
}

/// Find swing highs and lows. Non-finite values never qualify and never
/// let a neighbour qualify.
pub fn detect_swings(values: &[f64], lookback: usize) -> Swings {
    let mut swings = Swings::default();
    if lookback == 0 || values.len() < 2 * lookback + 1 {
        return swings;
    }

    for i in lookback..values.len() - lookback {
        let v = values[i];
        if !v.is_finite() {
            continue;
        }
        let neighbours = (1..=lookback).flat_map(|j| [values[i - j], values[i + j]]);
        let mut is_high = true;
        let mut is_low = true;
        for other in neighbours {
            if !other.is_finite() {
                is_high = false;
                is_low = false;
                break;
            }
            if v <= other {
                is_high = false;
            }
            if v >= other {
                is_low = false;
            }
        }
        if is_high {
            swings.highs.push(SwingPoint { index: i, value: v });
        }
        if is_low {
            swings.lows.push(SwingPoint { index: i, value: v });
        }
    }
    swings
}

/// A detected divergence and the two swing pairs that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub kind: DivergenceType,
    /// Earlier and later price extremes.
    pub price: (f64, f64),
    /// Earlier and later indicator extremes.
    pub indicator: (f64, f64),
}

/// Detect regular divergence over the trailing `window` values.
///
/// Bearish (price higher high, indicator lower high) is checked before
/// bullish (price lower low, indicator higher low).
pub fn detect_divergence(
    price: &[f64],
    indicator: &[f64],
    window: usize,
    swing_lookback: usize,
) -> Option<Divergence> {
    if price.len() < window || indicator.len() < window {
        return None;
    }
    let price = &price[price.len() - window..];
    let indicator = &indicator[indicator.len() - window..];

    let ps = detect_swings(price, swing_lookback);
    let is = detect_swings(indicator, swing_lookback);

    if let (Some((p1, p2)), Some((i1, i2))) = (last_two(&ps.highs), last_two(&is.highs)) {
        if p2 > p1 && i2 < i1 {
            return Some(Divergence {
                kind: DivergenceType::Bearish,
                price: (p1, p2),
                indicator: (i1, i2),
            });
        }
    }

    if let (Some((p1, p2)), Some((i1, i2))) = (last_two(&ps.lows), last_two(&is.lows)) {
        if p2 < p1 && i2 > i1 {
            return Some(Divergence {
                kind: DivergenceType::Bullish,
                price: (p1, p2),
                indicator: (i1, i2),
            });
        }
    }

    None
}

fn last_two(points: &[SwingPoint]) -> Option<(f64, f64)> {
    match points {
        [.., a, b] => Some((a.value, b.value)),
        _ => None,
    }
}
