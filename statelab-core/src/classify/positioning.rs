//! Positioning pillar: speculative exposure percentile.

use super::PillarNote;
use crate::domain::Positioning;

pub const CROWDED: f64 = 80.0;
pub const WASHED_OUT: f64 = 20.0;
pub const ELEVATED: f64 = 65.0;
pub const LIGHT: f64 = 35.0;

pub fn classify_positioning(percentile: Option<f64>) -> (Positioning, PillarNote) {
    let Some(p) = percentile.filter(|p| p.is_finite() && (0.0..=100.0).contains(p)) else {
        return (Positioning::Unknown, PillarNote::new("Positioning data unavailable"));
    };

    let (positioning, note) = if p > CROWDED {
        (
            Positioning::CrowdedLong,
            "Crowded long - elevated reversal risk, late-stage positioning",
        )
    } else if p < WASHED_OUT {
        (
            Positioning::WashedOut,
            "Washed out - contrarian bullish, positioning light",
        )
    } else if p > ELEVATED {
        (Positioning::ElevatedLong, "Elevated long - positioning stretched")
    } else if p < LIGHT {
        (Positioning::LightPositioning, "Light positioning - room to add")
    } else {
        (Positioning::Neutral, "Neutral positioning")
    };
    (
        positioning,
        PillarNote::with_conditions(note, vec![format!("Percentile {p:.0}")]),
    )
}
