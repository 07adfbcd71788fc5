//! Forward expectations: combines a live classified state with the
//! aggregated statistics for its key.
//!
//! Responses are ephemeral; nothing here is persisted.

use serde::{Deserialize, Serialize};

use crate::aggregate::{EdgeClass, StateStats, StatsTable};
use crate::classify::ClassifiedState;
use crate::domain::{
    DivergenceType, MarketState, Momentum, Participation, Positioning, Regime,
};
use crate::encode::StateKey;

/// Expected-return bucket for one horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnDirection {
    StronglyPositive,
    Positive,
    Flat,
    Negative,
    StronglyNegative,
}

impl ReturnDirection {
    pub fn of_mean(mean: f64) -> Self {
        if mean > 1.0 {
            ReturnDirection::StronglyPositive
        } else if mean > 0.25 {
            ReturnDirection::Positive
        } else if mean > -0.25 {
            ReturnDirection::Flat
        } else if mean > -1.0 {
            ReturnDirection::Negative
        } else {
            ReturnDirection::StronglyNegative
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ReturnDirection::StronglyPositive => "Strongly Positive",
            ReturnDirection::Positive => "Positive",
            ReturnDirection::Flat => "Flat",
            ReturnDirection::Negative => "Negative",
            ReturnDirection::StronglyNegative => "Strongly Negative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonExpectation {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub hit_rate: f64,
    pub direction: ReturnDirection,
    /// Median ± one standard deviation; five-day horizon only.
    pub typical_range: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub avg_drawdown_5d: f64,
    pub worst_drawdown_5d: f64,
    pub avg_runup_5d: f64,
    pub risk_reward: f64,
    pub expectancy_5d: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    LowSamples,
    HighVolatility,
    LowEdge,
    DrawdownRisk,
    PoorRiskReward,
    DivergenceActive,
    PullbackLikely,
    MomentumWeakening,
    CrowdedPositioning,
    WashedOut,
    DistributionWarning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub severity: Severity,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
        }
    }
}

/// Advisory condition under which the current read is wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invalidation {
    pub trigger: String,
    pub description: String,
    pub structural_level: String,
    /// Current value of the structural level, when it is a price.
    pub level_value: Option<f64>,
    /// Suggested stop distance (percent) from historical adverse excursion.
    pub stop_distance_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    pub instrument: String,
    pub key: String,
    pub state_readable: String,
    pub n_samples: usize,
    pub confidence: f64,
    pub edge_class: EdgeClass,
    pub horizon_5d: HorizonExpectation,
    pub horizon_10d: HorizonExpectation,
    pub horizon_20d: HorizonExpectation,
    pub risk: RiskMetrics,
    /// High severity first; stable within a severity.
    pub warnings: Vec<Warning>,
    pub invalidation: Invalidation,
    pub current_state: MarketState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExpectationResponse {
    /// No statistics exist for the instrument yet.
    NotComputed {
        instrument: String,
        key: String,
        state_readable: String,
    },
    /// Statistics exist, but not for this key.
    UnseenState {
        instrument: String,
        key: String,
        state_readable: String,
        total_states_available: usize,
    },
    Found(Box<Expectation>),
}

impl ExpectationResponse {
    pub fn has_data(&self) -> bool {
        matches!(self, ExpectationResponse::Found(_))
    }

    pub fn message(&self) -> &'static str {
        match self {
            ExpectationResponse::NotComputed { .. } => "Historical statistics not yet computed",
            ExpectationResponse::UnseenState { .. } => {
                "This state combination is rare in historical data - use caution and rely on other signals"
            }
            ExpectationResponse::Found(_) => "Historical statistics available",
        }
    }
}

/// `Regime / Momentum / Participation` in title case.
pub fn state_readable(state: &MarketState) -> String {
    format!(
        "{} / {} / {}",
        title_case(state.regime.label()),
        title_case(state.momentum.label()),
        title_case(state.participation.label())
    )
}

fn title_case(label: &str) -> String {
    label
        .split('_')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Look up the classified state in `table` (at the table's granularity).
pub fn serve(
    instrument: &str,
    classified: &ClassifiedState,
    table: Option<&StatsTable>,
) -> ExpectationResponse {
    let state = classified.state;
    let readable = state_readable(&state);

    let Some(table) = table else {
        return ExpectationResponse::NotComputed {
            instrument: instrument.to_string(),
            key: StateKey::three(&state).code(),
            state_readable: readable,
        };
    };

    let key = StateKey::from_state(&state, table.granularity).code();
    let Some(stats) = table.get(&key) else {
        return ExpectationResponse::UnseenState {
            instrument: instrument.to_string(),
            key,
            state_readable: readable,
            total_states_available: table.len(),
        };
    };

    ExpectationResponse::Found(Box::new(Expectation {
        instrument: instrument.to_string(),
        key,
        state_readable: readable,
        n_samples: stats.n_samples,
        confidence: stats.confidence,
        edge_class: stats.edge_class,
        horizon_5d: HorizonExpectation {
            mean: stats.mean_5d,
            median: stats.median_5d,
            std: stats.std_5d,
            hit_rate: stats.hit_rate_5d,
            direction: ReturnDirection::of_mean(stats.mean_5d),
            typical_range: Some((stats.median_5d - stats.std_5d, stats.median_5d + stats.std_5d)),
        },
        horizon_10d: HorizonExpectation {
            mean: stats.mean_10d,
            median: stats.median_10d,
            std: stats.std_10d,
            hit_rate: stats.hit_rate_10d,
            direction: ReturnDirection::of_mean(stats.mean_10d),
            typical_range: None,
        },
        horizon_20d: HorizonExpectation {
            mean: stats.mean_20d,
            median: stats.median_20d,
            std: stats.std_20d,
            hit_rate: stats.hit_rate_20d,
            direction: ReturnDirection::of_mean(stats.mean_20d),
            typical_range: None,
        },
        risk: RiskMetrics {
            avg_drawdown_5d: stats.avg_mae_5d,
            worst_drawdown_5d: stats.worst_mae_5d,
            avg_runup_5d: stats.avg_mfe_5d,
            risk_reward: stats.risk_reward_5d,
            expectancy_5d: stats.expectancy_5d,
        },
        warnings: risk_warnings(stats, classified),
        invalidation: invalidation(stats, classified),
        current_state: state,
    }))
}

/// Statistical and state warnings, high severity first.
pub fn risk_warnings(stats: &StateStats, classified: &ClassifiedState) -> Vec<Warning> {
    let mut w = Vec::new();

    if stats.n_samples < 30 {
        w.push(Warning::new(
            WarningKind::LowSamples,
            Severity::Medium,
            format!(
                "Only {} historical observations - statistics may be less reliable",
                stats.n_samples
            ),
        ));
    }
    if stats.std_5d > 3.0 {
        w.push(Warning::new(
            WarningKind::HighVolatility,
            Severity::High,
            format!("High volatility state - expect {:.1}% swings in 5 days", stats.std_5d),
        ));
    }
    if stats.hit_rate_5d > 45.0 && stats.hit_rate_5d < 55.0 {
        w.push(Warning::new(
            WarningKind::LowEdge,
            Severity::Medium,
            "Near 50% hit rate - no clear directional edge historically",
        ));
    }
    if stats.avg_mae_5d < -2.0 {
        w.push(Warning::new(
            WarningKind::DrawdownRisk,
            Severity::High,
            format!(
                "Avg drawdown of {:.1}% before gains materialize",
                stats.avg_mae_5d.abs()
            ),
        ));
    }
    if stats.risk_reward_5d < 0.8 {
        w.push(Warning::new(
            WarningKind::PoorRiskReward,
            Severity::Medium,
            format!(
                "Risk/reward ratio of {:.2} - drawdowns exceed gains",
                stats.risk_reward_5d
            ),
        ));
    }

    let state = classified.state;
    if let Some(kind) = classified.divergence {
        let side = match kind {
            DivergenceType::Bearish => "Bearish",
            DivergenceType::Bullish => "Bullish",
        };
        w.push(Warning::new(
            WarningKind::DivergenceActive,
            Severity::High,
            format!("{side} divergence detected - elevated reversal risk"),
        ));
    }
    if state.regime == Regime::Uptrend && state.momentum == Momentum::Cooling {
        if matches!(
            state.participation,
            Participation::Thinning | Participation::Distribution
        ) {
            w.push(Warning::new(
                WarningKind::PullbackLikely,
                Severity::High,
                "Uptrend with cooling momentum and weak participation - pullback probable",
            ));
        } else {
            w.push(Warning::new(
                WarningKind::MomentumWeakening,
                Severity::Medium,
                "Momentum cooling in uptrend - watch for continuation or reversal",
            ));
        }
    }
    match state.positioning {
        Positioning::CrowdedLong | Positioning::ElevatedLong => w.push(Warning::new(
            WarningKind::CrowdedPositioning,
            Severity::Medium,
            "Elevated long positioning - late-cycle risk, watch for profit-taking",
        )),
        Positioning::WashedOut => w.push(Warning::new(
            WarningKind::WashedOut,
            Severity::Low,
            "Washed-out positioning - room for new longs if the setup confirms",
        )),
        _ => {}
    }
    if state.regime == Regime::Uptrend && state.participation == Participation::Distribution {
        w.push(Warning::new(
            WarningKind::DistributionWarning,
            Severity::High,
            "Distribution pattern detected - selling into strength",
        ));
    }

    w.sort_by_key(|w| w.severity);
    w
}

pub fn invalidation(stats: &StateStats, classified: &ClassifiedState) -> Invalidation {
    let stop = stats.avg_mae_5d.abs();
    match classified.state.regime {
        Regime::Uptrend => Invalidation {
            trigger: "Close below SMA200".into(),
            description: "A daily close below the 200-day average invalidates the uptrend read"
                .into(),
            structural_level: "SMA200".into(),
            level_value: classified.sma_200,
            stop_distance_pct: stop,
        },
        Regime::Downtrend => Invalidation {
            trigger: "Close above SMA200".into(),
            description: "A daily close above the 200-day average invalidates the downtrend read"
                .into(),
            structural_level: "SMA200".into(),
            level_value: classified.sma_200,
            stop_distance_pct: stop,
        },
        Regime::Range | Regime::Unknown => Invalidation {
            trigger: "ADX crossing above 25 with directional break".into(),
            description: "Strong trend emergence (ADX > 25) ends the range-bound condition".into(),
            structural_level: "Range boundaries".into(),
            level_value: None,
            stop_distance_pct: stop,
        },
    }
}

/// Plain-text summary: state, horizons, risk, top three warnings, and the
/// invalidation trigger.
pub fn format_expectations_text(response: &ExpectationResponse) -> String {
    let e = match response {
        ExpectationResponse::Found(e) => e,
        ExpectationResponse::NotComputed { instrument, .. } => {
            return format!("No historical statistics for {instrument} - run the walk and aggregate first");
        }
        ExpectationResponse::UnseenState {
            state_readable,
            total_states_available,
            ..
        } => {
            return format!(
                "{state_readable}: {} ({total_states_available} states on record)",
                response.message()
            );
        }
    };

    let mut lines = vec![
        format!("State: {} [{}]", e.state_readable, e.key),
        format!(
            "Historical observations: {} (confidence {:.0}/100, edge {})",
            e.n_samples,
            e.confidence,
            e.edge_class.label()
        ),
        String::new(),
        "Forward expectations:".to_string(),
    ];
    for (label, h) in [("5-day", &e.horizon_5d), ("10-day", &e.horizon_10d), ("20-day", &e.horizon_20d)] {
        lines.push(format!(
            "  {label}: {} (mean {:+.2}%, hit rate {:.0}%)",
            h.direction.title(),
            h.mean,
            h.hit_rate
        ));
    }
    lines.push(String::new());
    lines.push("Risk profile:".to_string());
    if let Some((lo, hi)) = e.horizon_5d.typical_range {
        lines.push(format!("  Typical 5-day range: {lo:+.1}% to {hi:+.1}%"));
    }
    lines.push(format!(
        "  Avg drawdown before gains: {:.1}% (R:R {:.2})",
        e.risk.avg_drawdown_5d, e.risk.risk_reward
    ));

    if !e.warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings:".to_string());
        for w in e.warnings.iter().take(3) {
            let tag = match w.severity {
                Severity::High => "HIGH",
                Severity::Medium => "MED",
                Severity::Low => "LOW",
            };
            lines.push(format!("  [{tag}] {}", w.message));
        }
    }

    lines.push(String::new());
    lines.push(format!("Invalidation: {}", e.invalidation.trigger));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::confidence_score;
    use crate::classify::{assess, PillarNotes};
    use crate::domain::Tailwind;
    use crate::encode::{Granularity, KEY_SCHEME_VERSION};

    fn classified(state: MarketState, divergence: Option<DivergenceType>) -> ClassifiedState {
        ClassifiedState {
            state,
            divergence,
            notes: PillarNotes::default(),
            assessment: assess(&state, divergence),
            used_defaults: false,
            close: 105.0,
            sma_200: Some(100.0),
            adx: Some(22.0),
        }
    }

    fn uptrend(momentum: Momentum, participation: Participation) -> MarketState {
        MarketState {
            regime: Regime::Uptrend,
            momentum,
            participation,
            tailwind: Tailwind::Neutral,
            positioning: Positioning::Neutral,
        }
    }

    fn stats(key: &str, n: usize) -> StateStats {
        StateStats {
            key: key.to_string(),
            n_samples: n,
            mean_5d: 1.2,
            median_5d: 1.0,
            std_5d: 2.0,
            min_5d: -3.0,
            max_5d: 5.0,
            hit_rate_5d: 62.0,
            mean_10d: 0.5,
            median_10d: 0.4,
            std_10d: 2.5,
            min_10d: -4.0,
            max_10d: 6.0,
            hit_rate_10d: 58.0,
            mean_20d: -0.5,
            median_20d: -0.3,
            std_20d: 3.5,
            min_20d: -8.0,
            max_20d: 7.0,
            hit_rate_20d: 48.0,
            avg_mae_5d: -1.5,
            median_mae_5d: -1.2,
            worst_mae_5d: -4.0,
            avg_mfe_5d: 2.4,
            median_mfe_5d: 2.0,
            best_mfe_5d: 6.0,
            avg_mae_20d: -3.0,
            avg_mfe_20d: 4.0,
            confidence: confidence_score(n, 1.2, 2.0, 62.0),
            risk_reward_5d: 1.6,
            expectancy_5d: 0.9,
            edge_class: EdgeClass::StrongBullish,
        }
    }

    fn table(rows: Vec<StateStats>) -> StatsTable {
        StatsTable {
            instrument: "GLD".into(),
            key_version: KEY_SCHEME_VERSION,
            granularity: Granularity::ThreePillar,
            min_samples: 10,
            rows,
        }
    }

    #[test]
    fn missing_table_is_not_computed() {
        let c = classified(uptrend(Momentum::Accelerating, Participation::Confirming), None);
        let r = serve("GLD", &c, None);
        assert!(matches!(r, ExpectationResponse::NotComputed { .. }));
        assert!(!r.has_data());
    }

    #[test]
    fn unseen_key_reports_states_available() {
        let rows: Vec<_> = (0..50).map(|i| stats(&format!("Rz{i}_Mx_Px"), 40)).collect();
        let c = classified(uptrend(Momentum::Accelerating, Participation::Confirming), None);
        match serve("GLD", &c, Some(&table(rows))) {
            ExpectationResponse::UnseenState {
                total_states_available,
                key,
                ..
            } => {
                assert_eq!(total_states_available, 50);
                assert_eq!(key, "Ru_Ma_Pc");
            }
            other => panic!("expected unseen state, got {other:?}"),
        }
    }

    #[test]
    fn found_state_carries_directions_and_range() {
        let c = classified(uptrend(Momentum::Accelerating, Participation::Confirming), None);
        let r = serve("GLD", &c, Some(&table(vec![stats("Ru_Ma_Pc", 40)])));
        let ExpectationResponse::Found(e) = r else {
            panic!("expected a match");
        };
        assert_eq!(e.horizon_5d.direction, ReturnDirection::StronglyPositive);
        assert_eq!(e.horizon_10d.direction, ReturnDirection::Positive);
        assert_eq!(e.horizon_20d.direction, ReturnDirection::Negative);
        assert_eq!(e.horizon_5d.typical_range, Some((-1.0, 3.0)));
        assert_eq!(e.state_readable, "Uptrend / Accelerating / Confirming");
        assert_eq!(e.invalidation.trigger, "Close below SMA200");
        assert_eq!(e.invalidation.stop_distance_pct, 1.5);
        assert_eq!(e.invalidation.level_value, Some(100.0));
    }

    #[test]
    fn direction_buckets() {
        assert_eq!(ReturnDirection::of_mean(0.25), ReturnDirection::Flat);
        assert_eq!(ReturnDirection::of_mean(-0.25), ReturnDirection::Negative);
        assert_eq!(ReturnDirection::of_mean(-1.0), ReturnDirection::StronglyNegative);
    }

    #[test]
    fn warnings_sorted_high_first() {
        let mut s = stats("Ru_Mc_Pd", 20);
        s.hit_rate_5d = 50.0;
        let c = classified(uptrend(Momentum::Cooling, Participation::Distribution), None);
        let w = risk_warnings(&s, &c);
        let kinds: Vec<_> = w.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![
                WarningKind::PullbackLikely,
                WarningKind::DistributionWarning,
                WarningKind::LowSamples,
                WarningKind::LowEdge,
            ]
        );
    }

    #[test]
    fn divergence_and_positioning_warnings() {
        let mut state = uptrend(Momentum::Diverging, Participation::Neutral);
        state.positioning = Positioning::WashedOut;
        let c = classified(state, Some(DivergenceType::Bearish));
        let w = risk_warnings(&stats("Ru_Mv_Pn", 40), &c);
        assert_eq!(w[0].kind, WarningKind::DivergenceActive);
        assert!(w[0].message.starts_with("Bearish divergence"));
        assert_eq!(w.last().map(|w| w.severity), Some(Severity::Low));
    }

    #[test]
    fn range_invalidation_has_no_price_level() {
        let mut state = uptrend(Momentum::Steady, Participation::Neutral);
        state.regime = Regime::Range;
        let inv = invalidation(&stats("Rr_Ms_Pn", 40), &classified(state, None));
        assert!(inv.trigger.starts_with("ADX crossing above 25"));
        assert_eq!(inv.level_value, None);
    }

    #[test]
    fn text_shows_top_three_warnings() {
        let mut s = stats("Ru_Mc_Pd", 20);
        s.hit_rate_5d = 50.0;
        s.std_5d = 4.0;
        let c = classified(uptrend(Momentum::Cooling, Participation::Distribution), None);
        let text = format_expectations_text(&serve("GLD", &c, Some(&table(vec![s]))));
        assert_eq!(text.matches("[HIGH]").count(), 3);
        assert!(!text.contains("[MED]"));
        assert!(text.contains("Invalidation: Close below SMA200"));
    }
}
