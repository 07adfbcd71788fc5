//! State key encoding.
//!
//! A [`StateKey`] is a compact, versioned identifier for a market state at a
//! chosen granularity. The three-pillar key (regime, momentum,
//! participation) is the grouping used for historical statistics; the
//! five-pillar key adds tailwind and positioning.
//!
//! Text form: `R<c>_M<c>_P<c>` or `R<c>_M<c>_P<c>_T<c>_C<c>`. Parsing never
//! fails on an unrecognized pillar code; it maps to that pillar's `Unknown`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{MarketState, Momentum, Participation, Positioning, Regime, Tailwind};

/// Version of the code tables and key layout. Bump on any change.
pub const KEY_SCHEME_VERSION: u32 = 1;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    ThreePillar,
    FivePillar,
}

impl Granularity {
    pub fn label(self) -> &'static str {
        match self {
            Granularity::ThreePillar => "three_pillar",
            Granularity::FivePillar => "five_pillar",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim() {
            "three_pillar" | "3" => Some(Granularity::ThreePillar),
            "five_pillar" | "5" => Some(Granularity::FivePillar),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreePillar {
    pub regime: Regime,
    pub momentum: Momentum,
    pub participation: Participation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FivePillar {
    pub regime: Regime,
    pub momentum: Momentum,
    pub participation: Participation,
    pub tailwind: Tailwind,
    pub positioning: Positioning,
}

/// Tagged key over a pillar subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "granularity", rename_all = "snake_case")]
pub enum StateKey {
    ThreePillar(ThreePillar),
    FivePillar(FivePillar),
}

impl StateKey {
    pub fn from_state(state: &MarketState, granularity: Granularity) -> Self {
        match granularity {
            Granularity::ThreePillar => StateKey::ThreePillar(ThreePillar {
                regime: state.regime,
                momentum: state.momentum,
                participation: state.participation,
            }),
            Granularity::FivePillar => StateKey::FivePillar(FivePillar {
                regime: state.regime,
                momentum: state.momentum,
                participation: state.participation,
                tailwind: state.tailwind,
                positioning: state.positioning,
            }),
        }
    }

    pub fn three(state: &MarketState) -> Self {
        Self::from_state(state, Granularity::ThreePillar)
    }

    pub fn five(state: &MarketState) -> Self {
        Self::from_state(state, Granularity::FivePillar)
    }

    pub fn version(&self) -> u32 {
        KEY_SCHEME_VERSION
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            StateKey::ThreePillar(_) => Granularity::ThreePillar,
            StateKey::FivePillar(_) => Granularity::FivePillar,
        }
    }

    /// Drop tailwind and positioning. Identity on a three-pillar key.
    pub fn project_three(&self) -> Self {
        match *self {
            StateKey::ThreePillar(k) => StateKey::ThreePillar(k),
            StateKey::FivePillar(k) => StateKey::ThreePillar(ThreePillar {
                regime: k.regime,
                momentum: k.momentum,
                participation: k.participation,
            }),
        }
    }

    pub fn code(&self) -> String {
        match self {
            StateKey::ThreePillar(k) => format!(
                "R{}_M{}_P{}",
                regime_code(k.regime),
                momentum_code(k.momentum),
                participation_code(k.participation)
            ),
            StateKey::FivePillar(k) => format!(
                "R{}_M{}_P{}_T{}_C{}",
                regime_code(k.regime),
                momentum_code(k.momentum),
                participation_code(k.participation),
                tailwind_code(k.tailwind),
                positioning_code(k.positioning)
            ),
        }
    }

    /// Parse key text. The pillar count decides the granularity; a missing
    /// or unrecognized code becomes that pillar's `Unknown`. Text with
    /// neither three nor five segments is rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let parts: Vec<&str> = text.trim().split('_').collect();
        let code = |i: usize, tag: char| segment(&parts, i, tag);

        let regime = regime_from_code(code(0, 'R'));
        let momentum = momentum_from_code(code(1, 'M'));
        let participation = participation_from_code(code(2, 'P'));

        match parts.len() {
            3 => Some(StateKey::ThreePillar(ThreePillar {
                regime,
                momentum,
                participation,
            })),
            5 => Some(StateKey::FivePillar(FivePillar {
                regime,
                momentum,
                participation,
                tailwind: tailwind_from_code(code(3, 'T')),
                positioning: positioning_from_code(code(4, 'C')),
            })),
            _ => None,
        }
    }
}

fn segment<'a>(parts: &[&'a str], i: usize, tag: char) -> &'a str {
    parts
        .get(i)
        .and_then(|p| p.strip_prefix(tag))
        .unwrap_or("")
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

// Code tables. Each pair of functions must stay inverse on known values.

pub fn regime_code(r: Regime) -> &'static str {
    match r {
        Regime::Uptrend => "u",
        Regime::Downtrend => "d",
        Regime::Range => "r",
        Regime::Unknown => "x",
    }
}

pub fn regime_from_code(c: &str) -> Regime {
    match c {
        "u" => Regime::Uptrend,
        "d" => Regime::Downtrend,
        "r" => Regime::Range,
        _ => Regime::Unknown,
    }
}

pub fn momentum_code(m: Momentum) -> &'static str {
    match m {
        Momentum::Accelerating => "a",
        Momentum::Cooling => "c",
        Momentum::Diverging => "v",
        Momentum::Steady => "s",
        Momentum::Unknown => "x",
    }
}

pub fn momentum_from_code(c: &str) -> Momentum {
    match c {
        "a" => Momentum::Accelerating,
        "c" => Momentum::Cooling,
        "v" => Momentum::Diverging,
        "s" => Momentum::Steady,
        _ => Momentum::Unknown,
    }
}

pub fn participation_code(p: Participation) -> &'static str {
    match p {
        Participation::Confirming => "c",
        Participation::Thinning => "t",
        Participation::Distribution => "d",
        Participation::Accumulation => "a",
        Participation::Neutral => "n",
        Participation::Unknown => "x",
    }
}

pub fn participation_from_code(c: &str) -> Participation {
    match c {
        "c" => Participation::Confirming,
        "t" => Participation::Thinning,
        "d" => Participation::Distribution,
        "a" => Participation::Accumulation,
        "n" => Participation::Neutral,
        _ => Participation::Unknown,
    }
}

pub fn tailwind_code(t: Tailwind) -> &'static str {
    match t {
        Tailwind::Supportive => "s",
        Tailwind::Hostile => "h",
        Tailwind::Mixed => "m",
        Tailwind::Neutral => "n",
        Tailwind::Unknown => "x",
    }
}

pub fn tailwind_from_code(c: &str) -> Tailwind {
    match c {
        "s" => Tailwind::Supportive,
        "h" => Tailwind::Hostile,
        "m" => Tailwind::Mixed,
        "n" => Tailwind::Neutral,
        _ => Tailwind::Unknown,
    }
}

pub fn positioning_code(p: Positioning) -> &'static str {
    match p {
        Positioning::CrowdedLong => "cl",
        Positioning::WashedOut => "wo",
        Positioning::ElevatedLong => "el",
        Positioning::LightPositioning => "lp",
        Positioning::Neutral => "n",
        Positioning::Unknown => "u",
    }
}

pub fn positioning_from_code(c: &str) -> Positioning {
    match c {
        "cl" => Positioning::CrowdedLong,
        "wo" => Positioning::WashedOut,
        "el" => Positioning::ElevatedLong,
        "lp" => Positioning::LightPositioning,
        "n" => Positioning::Neutral,
        _ => Positioning::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(tailwind: Tailwind, positioning: Positioning) -> MarketState {
        MarketState {
            regime: Regime::Uptrend,
            momentum: Momentum::Accelerating,
            participation: Participation::Confirming,
            tailwind,
            positioning,
        }
    }

    #[test]
    fn key_text_layout() {
        let s = state(Tailwind::Supportive, Positioning::CrowdedLong);
        assert_eq!(StateKey::three(&s).code(), "Ru_Ma_Pc");
        assert_eq!(StateKey::five(&s).code(), "Ru_Ma_Pc_Ts_Ccl");
    }

    #[test]
    fn states_differing_only_outside_three_pillars_collapse() {
        let a = state(Tailwind::Supportive, Positioning::CrowdedLong);
        let b = state(Tailwind::Hostile, Positioning::WashedOut);
        assert_ne!(StateKey::five(&a), StateKey::five(&b));
        assert_eq!(StateKey::three(&a), StateKey::three(&b));
        assert_eq!(StateKey::five(&a).project_three(), StateKey::three(&b));
    }

    #[test]
    fn parse_inverts_code_on_every_state() {
        for r in Regime::ALL {
            for m in Momentum::ALL {
                for p in Participation::ALL {
                    let s = MarketState {
                        regime: *r,
                        momentum: *m,
                        participation: *p,
                        tailwind: Tailwind::Mixed,
                        positioning: Positioning::LightPositioning,
                    };
                    for key in [StateKey::three(&s), StateKey::five(&s)] {
                        assert_eq!(StateKey::parse(&key.code()), Some(key));
                    }
                }
            }
        }
    }

    #[test]
    fn unrecognized_codes_map_to_unknown() {
        let key = StateKey::parse("Rq_M?_Pc").unwrap();
        assert_eq!(
            key,
            StateKey::ThreePillar(ThreePillar {
                regime: Regime::Unknown,
                momentum: Momentum::Unknown,
                participation: Participation::Confirming,
            })
        );
        let five = StateKey::parse("Ru_Ma_Pc_Tz_Czz").unwrap();
        match five {
            StateKey::FivePillar(k) => {
                assert_eq!(k.tailwind, Tailwind::Unknown);
                assert_eq!(k.positioning, Positioning::Unknown);
            }
            StateKey::ThreePillar(_) => panic!("expected five-pillar key"),
        }
        assert!(StateKey::parse("Ru_Ma").is_none());
    }

    #[test]
    fn key_carries_version_and_granularity() {
        let k = StateKey::five(&MarketState::unknown());
        assert_eq!(k.version(), KEY_SCHEME_VERSION);
        assert_eq!(k.granularity(), Granularity::FivePillar);
        assert_eq!(k.project_three().granularity(), Granularity::ThreePillar);
        assert_eq!(k.code(), "Rx_Mx_Px_Tx_Cu");
    }
}
