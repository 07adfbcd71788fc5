//! Indicator engine.
//!
//! Single-series indicators implement the [`Indicator`] trait: bar history
//! in, a same-length numeric series out, `NaN` during warm-up. Everything
//! else in this module is a pure analysis helper over such series (swing
//! points, divergence, crossover scans, volume flow).
//!
//! # Look-ahead contamination guard
//! No value at bar t may depend on bars after t. Every indicator must pass
//! the truncated-vs-full series test in `tests/lookahead_test.rs`.

pub mod adx;
pub mod atr;
pub mod ema;
pub mod extremes;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod sma;
pub mod swing;
pub mod trend;
pub mod volume;

pub use adx::{directional_index, Adx, DirectionalSeries};
pub use atr::Atr;
pub use ema::Ema;
pub use macd::{Macd, MacdLines};
pub use obv::Obv;
pub use rsi::Rsi;
pub use sma::Sma;

use crate::domain::Bar;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. The first `lookback()` values are `f64::NAN` (warm-up).
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "rsi_14").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Last finite value of a series, if any.
pub fn last_finite(values: &[f64]) -> Option<f64> {
    values.last().copied().filter(|v| v.is_finite())
}

/// The finite values of a series, in order.
pub fn finite_values(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Trailing `n` elements of a slice (the whole slice if shorter).
pub fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

/// Percent difference of `current` from `level`. Zero level yields 0.
pub fn pct_from_level(current: f64, level: f64) -> f64 {
    if level == 0.0 {
        return 0.0;
    }
    (current - level) / level * 100.0
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Synthetic bars with an explicit volume per bar.
#[cfg(test)]
pub fn make_bars_with_volume(closes: &[f64], volumes: &[f64]) -> Vec<Bar> {
    let mut bars = make_bars(closes);
    for (bar, &v) in bars.iter_mut().zip(volumes) {
        bar.volume = v;
    }
    bars
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
