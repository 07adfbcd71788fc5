//! Regime pillar: trend strength (ADX) plus price/average structure.

use super::rules::{first_match, Rule};
use super::PillarNote;
use crate::domain::Regime;
use crate::snapshot::IndicatorSnapshot;

/// SMA50 slope (percent over the slope window) beyond which it counts as moving.
pub const SLOPE_THRESHOLD: f64 = 0.2;
/// ADX level separating trend from no trend.
pub const ADX_TREND: f64 = 18.0;
/// Within this percent of the 200-bar SMA the price counts as "near" it.
pub const NEAR_SMA_200_PCT: f64 = 3.0;

/// Raw regime inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeInputs {
    pub price: f64,
    pub sma_200: f64,
    pub sma_50: f64,
    pub sma_50_slope: f64,
    pub adx: f64,
}

impl RegimeInputs {
    /// All five inputs, or `None` if any is missing.
    pub fn from_snapshot(s: &IndicatorSnapshot) -> Option<Self> {
        Some(Self {
            price: s.close,
            sma_200: s.sma_200?,
            sma_50: s.sma_50?,
            sma_50_slope: s.sma_50_slope?,
            adx: s.adx?.adx,
        })
    }
}

struct Facts {
    above_200: bool,
    below_200: bool,
    sma50_above_200: bool,
    sma50_below_200: bool,
    slope_rising: bool,
    slope_falling: bool,
    slope_flat: bool,
    strong: bool,
    weak: bool,
    near_200: bool,
}

const RULES: &[Rule<Facts, Regime>] = &[
    Rule {
        when: |f| f.weak || (f.near_200 && f.slope_flat),
        then: Regime::Range,
        note: "No clear trend - ADX weak or price near SMA200 with flat slope",
    },
    Rule {
        when: |f| f.above_200 && f.sma50_above_200 && f.slope_rising && f.strong,
        then: Regime::Uptrend,
        note: "Uptrend confirmed - all bullish conditions met",
    },
    Rule {
        when: |f| f.below_200 && f.sma50_below_200 && f.slope_falling && f.strong,
        then: Regime::Downtrend,
        note: "Downtrend confirmed - all bearish conditions met",
    },
    Rule {
        when: |f| f.above_200 && f.strong,
        then: Regime::Uptrend,
        note: "Uptrend - price above SMA200 with trending ADX",
    },
    Rule {
        when: |f| f.below_200 && f.strong,
        then: Regime::Downtrend,
        note: "Downtrend - price below SMA200 with trending ADX",
    },
];

pub fn classify_regime(inputs: Option<RegimeInputs>) -> (Regime, PillarNote) {
    let Some(i) = inputs else {
        return (Regime::Unknown, PillarNote::new("Insufficient data"));
    };
    if i.sma_200 == 0.0 {
        return (Regime::Unknown, PillarNote::new("Insufficient data"));
    }

    let price_vs_200 = (i.price - i.sma_200) / i.sma_200 * 100.0;
    let facts = Facts {
        above_200: i.price > i.sma_200,
        below_200: i.price < i.sma_200,
        sma50_above_200: i.sma_50 > i.sma_200,
        sma50_below_200: i.sma_50 < i.sma_200,
        slope_rising: i.sma_50_slope > SLOPE_THRESHOLD,
        slope_falling: i.sma_50_slope < -SLOPE_THRESHOLD,
        slope_flat: i.sma_50_slope.abs() <= SLOPE_THRESHOLD,
        strong: i.adx > ADX_TREND,
        weak: i.adx < ADX_TREND,
        near_200: price_vs_200.abs() < NEAR_SMA_200_PCT,
    };

    let mut conditions = vec![
        if facts.above_200 {
            format!("Price above SMA200 ({price_vs_200:+.1}%)")
        } else {
            format!("Price below SMA200 ({price_vs_200:+.1}%)")
        },
        if facts.sma50_above_200 {
            "SMA50 > SMA200".to_string()
        } else {
            "SMA50 < SMA200".to_string()
        },
    ];
    let slope_word = if facts.slope_rising {
        "rising"
    } else if facts.slope_falling {
        "falling"
    } else {
        "flat"
    };
    conditions.push(format!("SMA50 slope {slope_word} ({:+.2}%)", i.sma_50_slope));
    conditions.push(format!("ADX = {:.1}", i.adx));

    let (regime, note) = match first_match(RULES, &facts) {
        Some(rule) => (rule.then, rule.note),
        None => (Regime::Range, "Range-bound - mixed signals"),
    };
    (regime, PillarNote::with_conditions(note, conditions))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(price: f64, sma_200: f64, sma_50: f64, slope: f64, adx: f64) -> Option<RegimeInputs> {
        Some(RegimeInputs {
            price,
            sma_200,
            sma_50,
            sma_50_slope: slope,
            adx,
        })
    }

    #[test]
    fn confirmed_uptrend() {
        let (regime, note) = classify_regime(inputs(110.0, 100.0, 105.0, 2.0, 25.0));
        assert_eq!(regime, Regime::Uptrend);
        assert!(note.description.starts_with("Uptrend confirmed"));
        assert_eq!(note.conditions.len(), 4);
    }

    #[test]
    fn weak_adx_is_range_even_above_average() {
        let (regime, _) = classify_regime(inputs(110.0, 100.0, 105.0, 2.0, 15.0));
        assert_eq!(regime, Regime::Range);
    }

    #[test]
    fn near_average_with_flat_slope_is_range() {
        let (regime, _) = classify_regime(inputs(101.0, 100.0, 99.0, 0.1, 30.0));
        assert_eq!(regime, Regime::Range);
    }

    #[test]
    fn confirmed_downtrend() {
        let (regime, _) = classify_regime(inputs(90.0, 100.0, 95.0, -1.0, 30.0));
        assert_eq!(regime, Regime::Downtrend);
    }

    #[test]
    fn strong_trend_above_average_without_slope_is_uptrend() {
        // SMA50 below SMA200 blocks the confirmed row, the looser row applies.
        let (regime, note) = classify_regime(inputs(110.0, 100.0, 98.0, 0.5, 22.0));
        assert_eq!(regime, Regime::Uptrend);
        assert!(note.description.contains("trending ADX"));
    }

    #[test]
    fn adx_exactly_at_threshold_falls_through_to_range() {
        let (regime, note) = classify_regime(inputs(110.0, 100.0, 105.0, 2.0, 18.0));
        assert_eq!(regime, Regime::Range);
        assert_eq!(note.description, "Range-bound - mixed signals");
    }

    #[test]
    fn missing_inputs_are_unknown() {
        assert_eq!(classify_regime(None).0, Regime::Unknown);
    }
}
