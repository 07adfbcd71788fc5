//! Participation pillar: does volume back the price move?

use super::rules::{first_match, Rule};
use super::PillarNote;
use crate::domain::{Participation, PriceDirection};
use crate::indicators::volume::VolumeFlow;
use crate::snapshot::IndicatorSnapshot;

/// OBV slope (percent) beyond which OBV counts as trending.
pub const OBV_SLOPE_THRESHOLD: f64 = 0.5;
pub const RATIO_STRONG: f64 = 1.1;
pub const RATIO_WEAK: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticipationInputs {
    pub up_down_ratio: Option<f64>,
    pub flow: Option<VolumeFlow>,
    pub obv_slope: Option<f64>,
    pub obv_above_sma: Option<bool>,
    pub price_direction: PriceDirection,
}

impl ParticipationInputs {
    pub fn from_snapshot(s: &IndicatorSnapshot) -> Self {
        Self {
            up_down_ratio: s.up_down_volume.as_ref().map(|u| u.ratio),
            flow: s.up_down_volume.as_ref().map(|u| u.flow),
            obv_slope: s.obv.as_ref().and_then(|o| o.slope),
            obv_above_sma: s.obv.as_ref().and_then(|o| o.above_sma()),
            price_direction: s.trend.price_direction(),
        }
    }
}

struct Facts {
    ratio: f64,
    flow: VolumeFlow,
    obv_rising: bool,
    obv_falling: bool,
    obv_bullish: bool,
}

const UP_RULES: &[Rule<Facts, Participation>] = &[
    Rule {
        when: |f| f.ratio > RATIO_STRONG && (f.obv_rising || f.obv_bullish),
        then: Participation::Confirming,
        note: "Volume confirming uptrend - strong buying on up days",
    },
    Rule {
        when: |f| f.ratio < RATIO_WEAK || f.obv_falling,
        then: Participation::Thinning,
        note: "Thinning participation - weak volume on rallies",
    },
];

const DOWN_RULES: &[Rule<Facts, Participation>] = &[
    Rule {
        when: |f| f.ratio < RATIO_WEAK && f.obv_falling,
        then: Participation::Confirming,
        note: "Volume confirming downtrend - heavy selling on down days",
    },
    Rule {
        when: |f| f.ratio > RATIO_STRONG || f.obv_rising,
        then: Participation::Thinning,
        note: "Selling pressure thinning - buyers stepping in",
    },
];

const FLAT_RULES: &[Rule<Facts, Participation>] = &[
    Rule {
        when: |f| f.flow.is_selling(),
        then: Participation::Distribution,
        note: "Distribution - selling into range",
    },
    Rule {
        when: |f| f.flow.is_buying(),
        then: Participation::Accumulation,
        note: "Accumulation - buying within range",
    },
];

pub fn classify_participation(inputs: &ParticipationInputs) -> (Participation, PillarNote) {
    let (Some(ratio), Some(flow)) = (inputs.up_down_ratio, inputs.flow) else {
        return (Participation::Unknown, PillarNote::new("Insufficient volume data"));
    };

    let facts = Facts {
        ratio,
        flow,
        obv_rising: inputs.obv_slope.is_some_and(|s| s > OBV_SLOPE_THRESHOLD),
        obv_falling: inputs.obv_slope.is_some_and(|s| s < -OBV_SLOPE_THRESHOLD),
        obv_bullish: inputs.obv_above_sma == Some(true),
    };

    let mut conditions = vec![format!("Up/down volume ratio {ratio:.2}")];
    if let Some(slope) = inputs.obv_slope {
        conditions.push(format!("OBV slope {slope:+.1}%"));
    }
    if let Some(above) = inputs.obv_above_sma {
        conditions.push(if above { "OBV above SMA20" } else { "OBV below SMA20" }.to_string());
    }

    let rules = match inputs.price_direction {
        PriceDirection::Up => UP_RULES,
        PriceDirection::Down => DOWN_RULES,
        PriceDirection::Flat => FLAT_RULES,
    };
    let (participation, note) = match first_match(rules, &facts) {
        Some(rule) => (rule.then, rule.note),
        None => (Participation::Neutral, "Neutral volume - no clear signal"),
    };
    (participation, PillarNote::with_conditions(note, conditions))
}
