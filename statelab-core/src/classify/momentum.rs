//! Momentum pillar: divergence first, then MACD histogram and RSI trajectory
//! read against the moving-average trend.

use super::rules::{first_match, Rule};
use super::PillarNote;
use crate::domain::{Direction, DivergenceType, Momentum, TrendAlignment};
use crate::snapshot::IndicatorSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MomentumInputs {
    pub divergence: Option<DivergenceType>,
    pub histogram_slope: Option<Direction>,
    pub rsi_direction: Option<Direction>,
    pub trend: TrendAlignment,
}

impl MomentumInputs {
    pub fn from_snapshot(s: &IndicatorSnapshot) -> Self {
        Self {
            divergence: s.rsi_divergence.map(|d| d.kind),
            histogram_slope: s.macd.as_ref().and_then(|m| m.histogram_slope),
            rsi_direction: s.rsi_momentum.as_ref().map(|m| m.direction),
            trend: s.trend,
        }
    }
}

struct Facts {
    hist_rising: bool,
    hist_falling: bool,
    rsi_rising: bool,
    rsi_falling: bool,
    uptrend: bool,
    downtrend: bool,
}

const RULES: &[Rule<Facts, Momentum>] = &[
    Rule {
        when: |f| f.hist_rising && f.rsi_rising,
        then: Momentum::Accelerating,
        note: "Accelerating - MACD histogram and RSI both rising",
    },
    Rule {
        when: |f| f.hist_falling && f.rsi_falling,
        then: Momentum::Cooling,
        note: "Cooling - MACD histogram and RSI both falling",
    },
    Rule {
        when: |f| f.uptrend && (f.hist_falling || f.rsi_falling),
        then: Momentum::Cooling,
        note: "Cooling - momentum fading within uptrend",
    },
    Rule {
        when: |f| f.downtrend && (f.hist_rising || f.rsi_rising),
        then: Momentum::Cooling,
        note: "Cooling - selling pressure easing within downtrend",
    },
    Rule {
        when: |f| f.hist_rising || f.rsi_rising,
        then: Momentum::Accelerating,
        note: "Accelerating - momentum building",
    },
    Rule {
        when: |f| f.hist_falling || f.rsi_falling,
        then: Momentum::Cooling,
        note: "Cooling - momentum fading",
    },
];

pub fn classify_momentum(inputs: &MomentumInputs) -> (Momentum, PillarNote) {
    match inputs.divergence {
        Some(DivergenceType::Bearish) => {
            return (
                Momentum::Diverging,
                PillarNote::new("Bearish divergence - price higher highs, RSI lower highs"),
            )
        }
        Some(DivergenceType::Bullish) => {
            return (
                Momentum::Diverging,
                PillarNote::new("Bullish divergence - price lower lows, RSI higher lows"),
            )
        }
        None => {}
    }

    if inputs.histogram_slope.is_none() && inputs.rsi_direction.is_none() {
        return (Momentum::Unknown, PillarNote::new("Insufficient data"));
    }

    let facts = Facts {
        hist_rising: inputs.histogram_slope == Some(Direction::Rising),
        hist_falling: inputs.histogram_slope == Some(Direction::Falling),
        rsi_rising: inputs.rsi_direction == Some(Direction::Rising),
        rsi_falling: inputs.rsi_direction == Some(Direction::Falling),
        uptrend: inputs.trend == TrendAlignment::Uptrend,
        downtrend: inputs.trend == TrendAlignment::Downtrend,
    };

    let conditions = vec![
        format!(
            "MACD histogram {}",
            inputs.histogram_slope.map_or("n/a", Direction::label)
        ),
        format!("RSI {}", inputs.rsi_direction.map_or("n/a", Direction::label)),
        format!("Trend {}", inputs.trend),
    ];

    let (momentum, note) = match first_match(RULES, &facts) {
        Some(rule) => (rule.then, rule.note),
        None => (Momentum::Steady, "Steady - no clear momentum shift"),
    };
    (momentum, PillarNote::with_conditions(note, conditions))
}
