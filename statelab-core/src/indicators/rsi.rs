//! Relative Strength Index (RSI) and RSI trajectory analysis.
//!
//! Average gain and average loss are plain means over the trailing `period`
//! close-to-close changes (Cutler's RSI), not Wilder-smoothed.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period.
//! Edge cases: avg_loss == 0 → RSI = 100; avg_gain == 0 → RSI = 0; a flat
//! window → 50. A non-finite change blanks every window that contains it.

use serde::{Deserialize, Serialize};

use super::{finite_values, tail, Indicator};
use crate::domain::{Bar, Bias, Direction};

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period + 1 {
            return result;
        }

        let mut changes = vec![f64::NAN; n];
        for i in 1..n {
            changes[i] = bars[i].close - bars[i - 1].close;
        }

        for i in self.period..n {
            let window = &changes[i + 1 - self.period..=i];
            if window.iter().any(|ch| !ch.is_finite()) {
                continue;
            }
            let avg_gain = window.iter().map(|ch| ch.max(0.0)).sum::<f64>() / self.period as f64;
            let avg_loss = window.iter().map(|ch| (-ch).max(0.0)).sum::<f64>() / self.period as f64;
            result[i] = compute_rsi(avg_gain, avg_loss);
        }

        result
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

pub const OVERBOUGHT: f64 = 70.0;
pub const OVERSOLD: f64 = 30.0;
/// Minimum RSI point change over the lookback to count as a direction.
pub const DIRECTION_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiZone {
    pub fn of(rsi: f64) -> Self {
        if rsi > OVERBOUGHT {
            RsiZone::Overbought
        } else if rsi < OVERSOLD {
            RsiZone::Oversold
        } else {
            RsiZone::Neutral
        }
    }
}

/// RSI trajectory over a short lookback, with an actionable label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiMomentum {
    pub current: f64,
    /// RSI at the start of the lookback window.
    pub previous: f64,
    pub change: f64,
    pub zone: RsiZone,
    pub direction: Direction,
    pub signal: String,
    pub bias: Bias,
}

/// Analyze the last `lookback` finite RSI values.
///
/// Returns `None` with fewer than two finite values.
pub fn analyze_rsi_momentum(rsi: &[f64], lookback: usize) -> Option<RsiMomentum> {
    let finite = finite_values(rsi);
    let recent = tail(&finite, lookback);
    if recent.len() < 2 {
        return None;
    }

    let current = recent[recent.len() - 1];
    let previous = recent[0];
    let change = current - previous;
    let zone = RsiZone::of(current);
    let direction = if change > DIRECTION_THRESHOLD {
        Direction::Rising
    } else if change < -DIRECTION_THRESHOLD {
        Direction::Falling
    } else {
        Direction::Flat
    };

    let (signal, bias) = rsi_signal(zone, direction, current);

    Some(RsiMomentum {
        current,
        previous,
        change,
        zone,
        direction,
        signal: signal.to_string(),
        bias,
    })
}

fn rsi_signal(zone: RsiZone, direction: Direction, current: f64) -> (&'static str, Bias) {
    use Direction::*;
    match (zone, direction) {
        (RsiZone::Overbought, Falling) => (
            "WAIT - RSI falling from overbought, potential pullback",
            Bias::Bearish,
        ),
        (RsiZone::Overbought, Rising) => (
            "CAUTION - RSI rising in overbought zone, extended",
            Bias::Bearish,
        ),
        (RsiZone::Overbought, Flat) => (
            "WATCH - RSI holding overbought, momentum may fade",
            Bias::Neutral,
        ),
        (RsiZone::Oversold, Rising) => (
            "BUY SIGNAL - RSI rising from oversold, recovery underway",
            Bias::Bullish,
        ),
        (RsiZone::Oversold, Falling) => (
            "WAIT - RSI still falling in oversold, not yet bottomed",
            Bias::Neutral,
        ),
        (RsiZone::Oversold, Flat) => (
            "WATCH - RSI holding oversold, potential bounce setup",
            Bias::Bullish,
        ),
        (RsiZone::Neutral, Rising) if current > 50.0 => (
            "BULLISH - RSI rising with positive momentum",
            Bias::Bullish,
        ),
        (RsiZone::Neutral, Falling) if current < 50.0 => (
            "BEARISH - RSI falling with negative momentum",
            Bias::Bearish,
        ),
        (RsiZone::Neutral, Rising) => (
            "IMPROVING - RSI turning up from low levels",
            Bias::Bullish,
        ),
        (RsiZone::Neutral, Falling) => (
            "WEAKENING - RSI turning down from high levels",
            Bias::Bearish,
        ),
        (RsiZone::Neutral, Flat) => ("NEUTRAL - RSI flat, wait for direction", Bias::Neutral),
    }
}
