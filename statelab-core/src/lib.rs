//! StateLab Core: indicators, market state classification, key encoding,
//! historical walk, aggregation, and forward expectations.
//!
//! This crate contains the pure engine:
//! - Domain types (bars, pillar vocabulary, market state)
//! - Indicator engine and point-in-time snapshots
//! - Five-pillar classifier built from ordered decision tables
//! - Versioned state keys
//! - Historical walk with forward outcome labels
//! - Per-state aggregation and the expectation lookup
//! - Collaborator traits for history, macro, and positioning sources

pub mod aggregate;
pub mod classify;
pub mod context;
pub mod data;
pub mod domain;
pub mod encode;
pub mod expectation;
pub mod indicators;
pub mod snapshot;
pub mod walk;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: engine types can cross thread boundaries, so the
    /// runner can walk dates in parallel and share tables between readers.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::MarketState>();
        require_sync::<domain::MarketState>();

        // Snapshot and classification
        require_send::<snapshot::IndicatorSnapshot>();
        require_sync::<snapshot::IndicatorSnapshot>();
        require_send::<snapshot::SnapshotConfig>();
        require_sync::<snapshot::SnapshotConfig>();
        require_send::<classify::ClassifiedState>();
        require_sync::<classify::ClassifiedState>();
        require_send::<context::ExogenousContext>();
        require_sync::<context::ExogenousContext>();

        // Keys, walk, aggregation
        require_send::<encode::StateKey>();
        require_sync::<encode::StateKey>();
        require_send::<walk::WalkConfig>();
        require_sync::<walk::WalkConfig>();
        require_send::<walk::ObservationRecord>();
        require_sync::<walk::ObservationRecord>();
        require_send::<aggregate::StatsTable>();
        require_sync::<aggregate::StatsTable>();
        require_send::<expectation::ExpectationResponse>();
        require_sync::<expectation::ExpectationResponse>();

        // Indicators
        require_send::<Box<dyn indicators::Indicator>>();
        require_sync::<Box<dyn indicators::Indicator>>();

        // Collaborators
        require_send::<data::TtlCache<String, f64>>();
        require_sync::<data::TtlCache<String, f64>>();
        require_send::<data::StaticHistory>();
        require_sync::<data::StaticHistory>();
    }

    /// Architecture contract: the classifier sees only a snapshot and the
    /// exogenous context, never the bar series, so it cannot read ahead.
    #[test]
    fn classifier_takes_no_bar_series() {
        fn _check_signature(
            snapshot: &snapshot::IndicatorSnapshot,
            context: &context::ExogenousContext,
        ) -> classify::ClassifiedState {
            classify::classify(snapshot, context)
        }
    }
}
