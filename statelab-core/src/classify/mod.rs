//! State classification: maps an indicator snapshot plus exogenous context
//! to the five-pillar [`MarketState`].
//!
//! Every pillar is classified independently. A missing input degrades only
//! its own pillar to `Unknown`; classification itself never fails.

pub mod assessment;
pub mod momentum;
pub mod participation;
pub mod positioning;
pub mod regime;
pub mod rules;
pub mod tailwind;

use serde::{Deserialize, Serialize};

use crate::context::ExogenousContext;
use crate::domain::{DivergenceType, MarketState};
use crate::snapshot::IndicatorSnapshot;

pub use assessment::{assess, Assessment, OverallBias};
pub use momentum::{classify_momentum, MomentumInputs};
pub use participation::{classify_participation, ParticipationInputs};
pub use positioning::classify_positioning;
pub use regime::{classify_regime, RegimeInputs};
pub use tailwind::{classify_tailwind, proxy_direction};

/// Human-readable reading of one pillar.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PillarNote {
    pub description: String,
    pub conditions: Vec<String>,
}

impl PillarNote {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            conditions: Vec::new(),
        }
    }

    pub fn with_conditions(description: impl Into<String>, conditions: Vec<String>) -> Self {
        Self {
            description: description.into(),
            conditions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PillarNotes {
    pub regime: PillarNote,
    pub momentum: PillarNote,
    pub participation: PillarNote,
    pub tailwind: PillarNote,
    pub positioning: PillarNote,
}

/// Full classifier output for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedState {
    pub state: MarketState,
    /// Divergence behind a `Diverging` momentum reading.
    pub divergence: Option<DivergenceType>,
    pub notes: PillarNotes,
    pub assessment: Assessment,
    /// True when a placeholder stood in for exogenous data.
    pub used_defaults: bool,
    /// Inputs the expectation server reads for invalidation text.
    pub close: f64,
    pub sma_200: Option<f64>,
    pub adx: Option<f64>,
}

pub fn classify(snapshot: &IndicatorSnapshot, context: &ExogenousContext) -> ClassifiedState {
    let (regime, regime_note) = classify_regime(RegimeInputs::from_snapshot(snapshot));
    let momentum_inputs = MomentumInputs::from_snapshot(snapshot);
    let (momentum, momentum_note) = classify_momentum(&momentum_inputs);
    let (participation, participation_note) =
        classify_participation(&ParticipationInputs::from_snapshot(snapshot));
    let (tailwind, tailwind_note) = classify_tailwind(&context.macro_input);
    let (positioning, positioning_note) = classify_positioning(context.positioning_percentile);

    let state = MarketState {
        regime,
        momentum,
        participation,
        tailwind,
        positioning,
    };
    let divergence = momentum_inputs.divergence;

    ClassifiedState {
        state,
        divergence,
        notes: PillarNotes {
            regime: regime_note,
            momentum: momentum_note,
            participation: participation_note,
            tailwind: tailwind_note,
            positioning: positioning_note,
        },
        assessment: assess(&state, divergence),
        used_defaults: context.used_defaults(),
        close: snapshot.close,
        sma_200: snapshot.sma_200,
        adx: snapshot.adx.map(|a| a.adx),
    }
}
