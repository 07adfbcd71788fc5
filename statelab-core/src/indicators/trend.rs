//! Trend helpers: moving-average alignment and moving-average slope.

use super::finite_values;
use crate::domain::TrendAlignment;

/// Classify price against the 20/50/200 simple moving averages.
///
/// Full bullish stacking (close > 20 > 50 > 200) is an uptrend, full bearish
/// stacking a downtrend. Otherwise an uptrend needs the close above at least
/// two averages with the averages stacked bullishly, and a downtrend needs
/// the close above at most one with the averages stacked bearishly.
pub fn classify_alignment(
    close: f64,
    sma20: Option<f64>,
    sma50: Option<f64>,
    sma200: Option<f64>,
) -> TrendAlignment {
    let (Some(s20), Some(s50), Some(s200)) = (sma20, sma50, sma200) else {
        return TrendAlignment::Unknown;
    };

    if close > s20 && s20 > s50 && s50 > s200 {
        return TrendAlignment::Uptrend;
    }
    if close < s20 && s20 < s50 && s50 < s200 {
        return TrendAlignment::Downtrend;
    }

    let above = [s20, s50, s200].iter().filter(|&&ma| close > ma).count();
    let ma_bullish = s20 > s50 && s50 > s200;
    let ma_bearish = s20 < s50 && s50 < s200;

    if above >= 2 && ma_bullish {
        TrendAlignment::Uptrend
    } else if above <= 1 && ma_bearish {
        TrendAlignment::Downtrend
    } else {
        TrendAlignment::Chop
    }
}

/// Percent change of a moving average across its last `lookback` finite
/// values. `None` until `lookback` values exist.
pub fn ma_slope(ma: &[f64], lookback: usize) -> Option<f64> {
    let finite = finite_values(ma);
    if lookback < 2 || finite.len() < lookback {
        return None;
    }
    let recent = &finite[finite.len() - lookback..];
    let (start, end) = (recent[0], recent[lookback - 1]);
    if start == 0.0 {
        return Some(0.0);
    }
    Some((end - start) / start * 100.0)
}
