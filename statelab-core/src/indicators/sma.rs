//! Simple Moving Average (SMA).
//!
//! Rolling mean over a lookback window. First valid value at index period-1.
//! Any non-finite value inside the window makes that output `NaN`.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        sma_of_series(&closes, self.period)
    }
}

/// Rolling mean of an arbitrary series (OBV, SMA of SMA, etc).
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    let mut sum = 0.0;
    let mut bad = 0usize;
    for &v in &values[..period] {
        if v.is_finite() {
            sum += v;
        } else {
            bad += 1;
        }
    }
    if bad == 0 {
        result[period - 1] = sum / period as f64;
    }

    for i in period..n {
        let leaving = values[i - period];
        let entering = values[i];
        if leaving.is_finite() {
            sum -= leaving;
        } else {
            bad -= 1;
        }
        if entering.is_finite() {
            sum += entering;
        } else {
            bad += 1;
        }
        if bad == 0 {
            result[i] = sum / period as f64;
        }
    }

    result
}
