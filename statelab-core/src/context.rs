//! Exogenous inputs to classification: macro backdrop and positioning.
//!
//! Only the Tailwind and Positioning pillars read these. Historical walks
//! have no point-in-time macro or positioning history, so they run with
//! [`ExogenousContext::historical_default`], and every record produced that
//! way is tagged `used_defaults`.

use serde::{Deserialize, Serialize};

/// Short- and medium-horizon percent changes of the two macro proxies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroContext {
    pub currency_change_5d: f64,
    pub currency_change_20d: f64,
    pub real_yield_change_5d: f64,
    pub real_yield_change_20d: f64,
}

impl MacroContext {
    pub fn is_finite(&self) -> bool {
        [
            self.currency_change_5d,
            self.currency_change_20d,
            self.real_yield_change_5d,
            self.real_yield_change_20d,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Where the macro backdrop came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MacroInput {
    Observed(MacroContext),
    /// No history available; the backdrop is taken as neutral.
    AssumedNeutral,
    /// The provider failed or returned nothing.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExogenousContext {
    pub macro_input: MacroInput,
    /// Positioning percentile, 0..=100.
    pub positioning_percentile: Option<f64>,
}

impl ExogenousContext {
    /// Context used for every historical date: macro assumed neutral,
    /// positioning absent.
    pub fn historical_default() -> Self {
        Self {
            macro_input: MacroInput::AssumedNeutral,
            positioning_percentile: None,
        }
    }

    /// Context for a live query from whatever the providers returned.
    pub fn live(macro_context: Option<MacroContext>, positioning_percentile: Option<f64>) -> Self {
        Self {
            macro_input: match macro_context {
                Some(m) => MacroInput::Observed(m),
                None => MacroInput::Unavailable,
            },
            positioning_percentile,
        }
    }

    /// True when a neutral placeholder stood in for real macro data.
    pub fn used_defaults(&self) -> bool {
        matches!(self.macro_input, MacroInput::AssumedNeutral)
    }
}

impl Default for ExogenousContext {
    fn default() -> Self {
        Self::historical_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn historical_default_is_flagged() {
        assert!(ExogenousContext::historical_default().used_defaults());
        assert!(!ExogenousContext::live(None, Some(50.0)).used_defaults());
    }

    #[test]
    fn live_without_macro_is_unavailable() {
        let ctx = ExogenousContext::live(None, None);
        assert_eq!(ctx.macro_input, MacroInput::Unavailable);
    }

    #[test]
    fn macro_finiteness() {
        let mut m = MacroContext {
            currency_change_5d: 0.1,
            currency_change_20d: 0.2,
            real_yield_change_5d: 0.3,
            real_yield_change_20d: 0.4,
        };
        assert!(m.is_finite());
        m.real_yield_change_20d = f64::NAN;
        assert!(!m.is_finite());
    }
}
