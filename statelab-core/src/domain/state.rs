//! Market state vocabulary: the five pillars and their shared value types.
//!
//! Every pillar carries an explicit `Unknown` value. Missing inputs degrade a
//! single pillar to `Unknown` instead of failing the whole classification.
//!
//! Labels are the lowercase snake_case names used in persisted datasets and
//! JSON output. Parsing a label never fails: unrecognized text maps to
//! `Unknown` (or the enum's neutral fallback where it has no `Unknown`).

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! labelled {
    ($name:ident, $fallback:ident, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stable snake_case label.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Parse a label; unrecognized text maps to the fallback value.
            pub fn from_label(s: &str) -> Self {
                match s.trim() {
                    $($label => $name::$variant,)+
                    _ => $name::$fallback,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

/// Trend regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Uptrend,
    Downtrend,
    Range,
    Unknown,
}

labelled!(Regime, Unknown, {
    Uptrend => "uptrend",
    Downtrend => "downtrend",
    Range => "range",
    Unknown => "unknown",
});

/// Momentum character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Momentum {
    Accelerating,
    Cooling,
    Diverging,
    Steady,
    Unknown,
}

labelled!(Momentum, Unknown, {
    Accelerating => "accelerating",
    Cooling => "cooling",
    Diverging => "diverging",
    Steady => "steady",
    Unknown => "unknown",
});

/// Whether volume confirms the price move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participation {
    Confirming,
    Thinning,
    Distribution,
    Accumulation,
    Neutral,
    Unknown,
}

labelled!(Participation, Unknown, {
    Confirming => "confirming",
    Thinning => "thinning",
    Distribution => "distribution",
    Accumulation => "accumulation",
    Neutral => "neutral",
    Unknown => "unknown",
});

/// Macro backdrop for the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tailwind {
    Supportive,
    Hostile,
    Mixed,
    Neutral,
    Unknown,
}

labelled!(Tailwind, Unknown, {
    Supportive => "supportive",
    Hostile => "hostile",
    Mixed => "mixed",
    Neutral => "neutral",
    Unknown => "unknown",
});

/// Where speculative exposure sits in its historical distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Positioning {
    CrowdedLong,
    WashedOut,
    ElevatedLong,
    LightPositioning,
    Neutral,
    Unknown,
}

labelled!(Positioning, Unknown, {
    CrowdedLong => "crowded_long",
    WashedOut => "washed_out",
    ElevatedLong => "elevated_long",
    LightPositioning => "light_positioning",
    Neutral => "neutral",
    Unknown => "unknown",
});

/// Short-horizon direction of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Rising,
    Falling,
    Flat,
}

labelled!(Direction, Flat, {
    Rising => "rising",
    Falling => "falling",
    Flat => "flat",
});

/// Directional lean of a signal or divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

labelled!(Bias, Neutral, {
    Bullish => "bullish",
    Bearish => "bearish",
    Neutral => "neutral",
});

/// Price/indicator divergence type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceType {
    /// Price lower low, indicator higher low.
    Bullish,
    /// Price higher high, indicator lower high.
    Bearish,
}

impl DivergenceType {
    pub fn bias(self) -> Bias {
        match self {
            DivergenceType::Bullish => Bias::Bullish,
            DivergenceType::Bearish => Bias::Bearish,
        }
    }
}

/// Price and moving-average alignment (price vs SMA20/50/200).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendAlignment {
    Uptrend,
    Downtrend,
    Chop,
    Unknown,
}

labelled!(TrendAlignment, Unknown, {
    Uptrend => "uptrend",
    Downtrend => "downtrend",
    Chop => "chop",
    Unknown => "unknown",
});

impl TrendAlignment {
    /// Price direction used by participation analysis.
    pub fn price_direction(self) -> PriceDirection {
        match self {
            TrendAlignment::Uptrend => PriceDirection::Up,
            TrendAlignment::Downtrend => PriceDirection::Down,
            TrendAlignment::Chop | TrendAlignment::Unknown => PriceDirection::Flat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceDirection {
    Up,
    Down,
    Flat,
}

/// The five-pillar market state. Stateless; recomputed on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketState {
    pub regime: Regime,
    pub momentum: Momentum,
    pub participation: Participation,
    pub tailwind: Tailwind,
    pub positioning: Positioning,
}

impl MarketState {
    pub fn unknown() -> Self {
        Self {
            regime: Regime::Unknown,
            momentum: Momentum::Unknown,
            participation: Participation::Unknown,
            tailwind: Tailwind::Unknown,
            positioning: Positioning::Unknown,
        }
    }
}

impl Default for MarketState {
    fn default() -> Self {
        Self::unknown()
    }
}
