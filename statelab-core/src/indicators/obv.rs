//! On-Balance Volume (OBV) and OBV flow analysis.
//!
//! OBV adds the bar's volume on up closes and subtracts it on down closes,
//! starting from zero on the first bar.

use serde::{Deserialize, Serialize};

use super::{tail, Indicator};
use crate::domain::{Bar, Bias, DivergenceType};

#[derive(Debug, Clone, Default)]
pub struct Obv;

impl Indicator for Obv {
    fn name(&self) -> &str {
        "obv"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut result = Vec::with_capacity(bars.len());
        let mut acc = 0.0;
        for (i, bar) in bars.iter().enumerate() {
            if i > 0 {
                let diff = bar.close - bars[i - 1].close;
                if diff > 0.0 {
                    acc += bar.volume;
                } else if diff < 0.0 {
                    acc -= bar.volume;
                }
            }
            result.push(acc);
        }
        result
    }
}

/// Percent change of OBV across the last `window` values, relative to |start|.
///
/// A zero starting value yields 0.
pub fn obv_slope(obv: &[f64], window: usize) -> Option<f64> {
    if window < 2 || obv.len() < window {
        return None;
    }
    let recent = tail(obv, window);
    let (start, end) = (recent[0], recent[recent.len() - 1]);
    if start == 0.0 {
        return Some(0.0);
    }
    Some((end - start) / start.abs() * 100.0)
}

/// OBV relation between price and volume over the latest window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObvFlow {
    ConfirmingUptrend,
    ConfirmingDowntrend,
    Accumulation,
    Distribution,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObvMomentum {
    pub obv_change: f64,
    pub price_change: f64,
    pub flow: ObvFlow,
    pub divergence: Option<DivergenceType>,
    pub signal: String,
    pub bias: Bias,
}

/// Flow over the latest `lookback` bars, with the price/OBV divergence
/// folded into the signal.
///
/// `divergence` is the swing-based divergence of price against OBV (see
/// [`detect_divergence`](super::swing::detect_divergence)). Needs
/// `lookback + 5` values of both series.
pub fn analyze_obv_momentum(
    closes: &[f64],
    obv: &[f64],
    lookback: usize,
    divergence: Option<DivergenceType>,
) -> Option<ObvMomentum> {
    let n = closes.len().min(obv.len());
    if lookback < 2 || n < lookback + 5 {
        return None;
    }
    let recent_close = tail(closes, lookback);
    let recent_obv = tail(obv, lookback);

    let obv_change = recent_obv[lookback - 1] - recent_obv[0];
    let price_change = recent_close[lookback - 1] - recent_close[0];

    let flow = if obv_change > 0.0 && price_change > 0.0 {
        ObvFlow::ConfirmingUptrend
    } else if obv_change < 0.0 && price_change < 0.0 {
        ObvFlow::ConfirmingDowntrend
    } else if obv_change > 0.0 {
        ObvFlow::Accumulation
    } else if obv_change < 0.0 {
        ObvFlow::Distribution
    } else {
        ObvFlow::Neutral
    };

    let (signal, bias) = match (divergence, flow) {
        (Some(DivergenceType::Bullish), _) => (
            "BULLISH DIVERGENCE - Accumulation despite price drop",
            Bias::Bullish,
        ),
        (Some(DivergenceType::Bearish), _) => (
            "BEARISH DIVERGENCE - Distribution despite price rise, caution",
            Bias::Bearish,
        ),
        (None, ObvFlow::Accumulation) => (
            "ACCUMULATION - OBV rising while price flat/down, watch for breakout",
            Bias::Bullish,
        ),
        (None, ObvFlow::Distribution) => (
            "DISTRIBUTION - OBV falling while price flat/up, watch for breakdown",
            Bias::Bearish,
        ),
        (None, ObvFlow::ConfirmingUptrend) => (
            "CONFIRMED UPTREND - Price and volume rising together",
            Bias::Bullish,
        ),
        (None, ObvFlow::ConfirmingDowntrend) => (
            "CONFIRMED DOWNTREND - Price and volume falling together",
            Bias::Bearish,
        ),
        (None, ObvFlow::Neutral) => ("NEUTRAL - No clear OBV signal", Bias::Neutral),
    };

    Some(ObvMomentum {
        obv_change,
        price_change,
        flow,
        divergence,
        signal: signal.to_string(),
        bias,
    })
}
