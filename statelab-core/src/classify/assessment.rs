//! Overall five-pillar assessment: signal tally, bias, and an action line.

use serde::{Deserialize, Serialize};

use crate::domain::{DivergenceType, MarketState, Momentum, Participation, Positioning, Regime, Tailwind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallBias {
    StronglyBullish,
    Bullish,
    Neutral,
    Bearish,
    StronglyBearish,
}

impl OverallBias {
    pub fn of_net(net: i32) -> Self {
        if net >= 3 {
            OverallBias::StronglyBullish
        } else if net >= 1 {
            OverallBias::Bullish
        } else if net <= -3 {
            OverallBias::StronglyBearish
        } else if net <= -1 {
            OverallBias::Bearish
        } else {
            OverallBias::Neutral
        }
    }

    pub fn is_bullish(self) -> bool {
        matches!(self, OverallBias::Bullish | OverallBias::StronglyBullish)
    }

    fn action(self) -> &'static str {
        match self {
            OverallBias::StronglyBullish => "Trend favorable - consider adding on pullbacks",
            OverallBias::Bullish => "Cautiously bullish - hold positions, selective adding",
            OverallBias::StronglyBearish => "Trend unfavorable - avoid longs, consider reducing",
            OverallBias::Bearish => "Cautiously bearish - reduce exposure, tighten stops",
            OverallBias::Neutral => "Mixed signals - wait for clarity, trade range",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub bias: OverallBias,
    pub action: String,
    pub bullish_signals: i32,
    pub bearish_signals: i32,
    pub warnings: Vec<String>,
}

impl Assessment {
    pub fn net_score(&self) -> i32 {
        self.bullish_signals - self.bearish_signals
    }
}

pub fn assess(state: &MarketState, divergence: Option<DivergenceType>) -> Assessment {
    let mut bullish = 0;
    let mut bearish = 0;
    let mut warnings = Vec::new();

    match state.regime {
        Regime::Uptrend => bullish += 2,
        Regime::Downtrend => bearish += 2,
        Regime::Range | Regime::Unknown => {}
    }

    match (state.momentum, divergence) {
        (Momentum::Accelerating, _) => bullish += 1,
        (Momentum::Cooling, _) => bearish += 1,
        (Momentum::Diverging, Some(DivergenceType::Bearish)) => {
            bearish += 1;
            warnings.push("Bearish divergence detected".to_string());
        }
        (Momentum::Diverging, Some(DivergenceType::Bullish)) => {
            bullish += 1;
            warnings.push("Bullish divergence detected".to_string());
        }
        _ => {}
    }

    match state.participation {
        Participation::Confirming => bullish += 1,
        Participation::Thinning => bearish += 1,
        Participation::Distribution => {
            bearish += 1;
            warnings.push("Distribution pattern detected".to_string());
        }
        _ => {}
    }

    match state.tailwind {
        Tailwind::Supportive => bullish += 1,
        Tailwind::Hostile => bearish += 1,
        _ => {}
    }

    match state.positioning {
        Positioning::CrowdedLong => warnings.push("Crowded long positioning - reversal risk".to_string()),
        Positioning::WashedOut => bullish += 1,
        _ => {}
    }

    let bias = OverallBias::of_net(bullish - bearish);
    let action = if !warnings.is_empty() && bias.is_bullish() {
        format!("{}. CAUTION: {}", bias.action(), warnings.join(", "))
    } else {
        bias.action().to_string()
    };

    Assessment {
        bias,
        action,
        bullish_signals: bullish,
        bearish_signals: bearish,
        warnings,
    }
}
