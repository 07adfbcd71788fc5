//! Tailwind pillar: direction of a currency proxy and a real-yield proxy.
//!
//! Both proxies falling is supportive, both rising hostile.

use super::PillarNote;
use crate::context::{MacroContext, MacroInput};
use crate::domain::{Direction, Tailwind};

/// 5d / 20d percent-change thresholds for the currency proxy.
pub const CURRENCY_THRESHOLDS: (f64, f64) = (0.5, 1.0);
/// 5d / 20d percent-change thresholds for the real-yield proxy.
pub const REAL_YIELD_THRESHOLDS: (f64, f64) = (2.5, 5.0);

/// Rising only when both horizons clear their threshold, falling only when
/// both clear the negative threshold.
pub fn proxy_direction(change_5d: f64, change_20d: f64, thresholds: (f64, f64)) -> Direction {
    let (t5, t20) = thresholds;
    if change_5d > t5 && change_20d > t20 {
        Direction::Rising
    } else if change_5d < -t5 && change_20d < -t20 {
        Direction::Falling
    } else {
        Direction::Flat
    }
}

pub fn classify_tailwind(input: &MacroInput) -> (Tailwind, PillarNote) {
    let ctx: &MacroContext = match input {
        MacroInput::Observed(ctx) if ctx.is_finite() => ctx,
        MacroInput::Observed(_) | MacroInput::Unavailable => {
            return (Tailwind::Unknown, PillarNote::new("Macro data unavailable"))
        }
        MacroInput::AssumedNeutral => {
            return (
                Tailwind::Neutral,
                PillarNote::new("Macro backdrop assumed neutral (no history)"),
            )
        }
    };

    let currency = proxy_direction(
        ctx.currency_change_5d,
        ctx.currency_change_20d,
        CURRENCY_THRESHOLDS,
    );
    let real_yield = proxy_direction(
        ctx.real_yield_change_5d,
        ctx.real_yield_change_20d,
        REAL_YIELD_THRESHOLDS,
    );

    let (tailwind, note) = match (currency, real_yield) {
        (Direction::Falling, Direction::Falling) => (
            Tailwind::Supportive,
            "Supportive - currency and real yields both falling",
        ),
        (Direction::Rising, Direction::Rising) => (
            Tailwind::Hostile,
            "Hostile - currency and real yields both rising",
        ),
        (Direction::Rising, Direction::Falling) | (Direction::Falling, Direction::Rising) => {
            (Tailwind::Mixed, "Mixed - macro drivers pulling in opposite directions")
        }
        _ => (Tailwind::Neutral, "Neutral - no decisive macro move"),
    };

    let conditions = vec![
        format!(
            "Currency {currency} ({:+.2}% 5d, {:+.2}% 20d)",
            ctx.currency_change_5d, ctx.currency_change_20d
        ),
        format!(
            "Real yield {real_yield} ({:+.2}% 5d, {:+.2}% 20d)",
            ctx.real_yield_change_5d, ctx.real_yield_change_20d
        ),
    ];
    (tailwind, PillarNote::with_conditions(note, conditions))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(c5: f64, c20: f64, y5: f64, y20: f64) -> MacroInput {
        MacroInput::Observed(MacroContext {
            currency_change_5d: c5,
            currency_change_20d: c20,
            real_yield_change_5d: y5,
            real_yield_change_20d: y20,
        })
    }

    #[test]
    fn direction_needs_both_horizons() {
        assert_eq!(proxy_direction(0.6, 1.2, CURRENCY_THRESHOLDS), Direction::Rising);
        assert_eq!(proxy_direction(0.6, 0.8, CURRENCY_THRESHOLDS), Direction::Flat);
        assert_eq!(proxy_direction(-0.6, -1.2, CURRENCY_THRESHOLDS), Direction::Falling);
    }

    #[test]
    fn both_falling_is_supportive() {
        let t = classify_tailwind(&observed(-1.0, -2.0, -3.0, -6.0)).0;
        assert_eq!(t, Tailwind::Supportive);
    }

    #[test]
    fn both_rising_is_hostile() {
        let t = classify_tailwind(&observed(1.0, 2.0, 3.0, 6.0)).0;
        assert_eq!(t, Tailwind::Hostile);
    }

    #[test]
    fn opposite_directions_are_mixed() {
        let t = classify_tailwind(&observed(1.0, 2.0, -3.0, -6.0)).0;
        assert_eq!(t, Tailwind::Mixed);
    }

    #[test]
    fn one_flat_is_neutral() {
        let t = classify_tailwind(&observed(1.0, 2.0, 0.0, 0.0)).0;
        assert_eq!(t, Tailwind::Neutral);
    }

    #[test]
    fn assumed_neutral_and_unavailable() {
        assert_eq!(classify_tailwind(&MacroInput::AssumedNeutral).0, Tailwind::Neutral);
        assert_eq!(classify_tailwind(&MacroInput::Unavailable).0, Tailwind::Unknown);
        let nan = observed(f64::NAN, 0.0, 0.0, 0.0);
        assert_eq!(classify_tailwind(&nan).0, Tailwind::Unknown);
    }
}
