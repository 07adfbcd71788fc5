//! Pipeline: load, walk, persist, aggregate, publish.
//!
//! Entry points:
//! - `walk_parallel()`: the historical walk with dates fanned out on rayon.
//! - `run_instrument()`: one instrument end to end.
//! - `run_universe()`: every instrument; a failure is reported for that
//!   instrument only.
//! - `aggregate_stored()`: rebuild stats from an existing observations file.
//! - `expect_live()`: classify the latest bar and look it up.

use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use statelab_core::aggregate::{aggregate, StatsTable};
use statelab_core::classify::{classify, ClassifiedState};
use statelab_core::context::ExogenousContext;
use statelab_core::data::HistoryProvider;
use statelab_core::domain::Bar;
use statelab_core::expectation::{serve, ExpectationResponse};
use statelab_core::snapshot::{compute_snapshot, IndicatorError};
use statelab_core::walk::{
    observe_at, summarize, walk_indices, WalkConfig, WalkError, WalkReport, WalkSummary,
};

use crate::config::{ConfigError, PipelineConfig};
use crate::data_loader::{load_history, LoadError};
use crate::registry::StatsRegistry;
use crate::store::{DatasetStore, StoreError};

/// Errors from the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("walk error: {0}")]
    Walk(#[from] WalkError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("indicator error: {0}")]
    Indicator(#[from] IndicatorError),
}

/// Walk a series, optionally spreading dates over the rayon pool.
///
/// Each date reads only its own prefix, so the parallel and sequential
/// walks produce identical reports.
pub fn walk_parallel(
    instrument: &str,
    bars: &[Bar],
    cfg: &WalkConfig,
    context: &ExogenousContext,
    parallel: bool,
) -> Result<WalkReport, WalkError> {
    let indices = walk_indices(bars, cfg)?;

    let outcomes: Vec<_> = if parallel {
        indices
            .par_iter()
            .map(|&i| observe_at(instrument, bars, i, cfg, context))
            .collect()
    } else {
        indices
            .iter()
            .map(|&i| observe_at(instrument, bars, i, cfg, context))
            .collect()
    };

    let mut report = WalkReport {
        instrument: instrument.to_string(),
        records: Vec::with_capacity(outcomes.len()),
        skipped: Vec::new(),
    };
    for outcome in outcomes {
        match outcome {
            Ok(record) => report.records.push(record),
            Err(skip) => {
                debug!(instrument, date = %skip.date, reason = ?skip.reason, "skipped date");
                report.skipped.push(skip);
            }
        }
    }
    report.records.sort_by_key(|r| r.date);
    report.skipped.sort_by_key(|s| s.date);
    Ok(report)
}

/// Everything one instrument run produced.
#[derive(Debug, Clone)]
pub struct InstrumentRun {
    pub instrument: String,
    pub fingerprint: String,
    pub dataset_hash: String,
    pub bars: usize,
    pub summary: WalkSummary,
    pub table: StatsTable,
    pub observations_path: PathBuf,
    pub stats_path: PathBuf,
}

/// Outcome for one instrument of a universe run.
#[derive(Debug)]
pub struct InstrumentOutcome {
    pub instrument: String,
    pub result: Result<InstrumentRun, PipelineError>,
}

/// Load, walk, persist observations, aggregate, persist stats, publish.
pub fn run_instrument(
    config: &PipelineConfig,
    provider: &dyn HistoryProvider,
    store: &DatasetStore,
    registry: &StatsRegistry,
    instrument: &str,
) -> Result<InstrumentRun, PipelineError> {
    let started = Instant::now();
    let loaded = load_history(provider, instrument)?;
    let fingerprint = config.fingerprint(&loaded.dataset_hash)?;

    let report = walk_parallel(
        instrument,
        &loaded.bars,
        &config.walk_config(),
        &ExogenousContext::historical_default(),
        config.data.parallel,
    )?;
    let summary = summarize(&report);
    let observations_path = store.write_observations(instrument, &report.records)?;

    let table = aggregate(instrument, &report.records, &config.aggregate);
    let stats_path = store.write_stats(&table)?;

    info!(
        instrument,
        bars = loaded.bars.len(),
        observations = summary.total,
        valid = summary.valid,
        skipped = summary.skipped,
        states = table.len(),
        fingerprint = %&fingerprint[..12],
        elapsed_ms = started.elapsed().as_millis() as u64,
        "instrument run complete"
    );
    registry.publish(table.clone());

    Ok(InstrumentRun {
        instrument: instrument.to_string(),
        fingerprint,
        dataset_hash: loaded.dataset_hash,
        bars: loaded.bars.len(),
        summary,
        table,
        observations_path,
        stats_path,
    })
}

/// Run every instrument in order. One instrument's failure is logged and
/// returned in its outcome; the others still run.
pub fn run_universe(
    config: &PipelineConfig,
    provider: &dyn HistoryProvider,
    store: &DatasetStore,
    registry: &StatsRegistry,
    instruments: &[String],
) -> Vec<InstrumentOutcome> {
    info!(instruments = instruments.len(), "starting universe run");
    let outcomes: Vec<InstrumentOutcome> = instruments
        .iter()
        .map(|instrument| {
            let result = run_instrument(config, provider, store, registry, instrument);
            if let Err(e) = &result {
                warn!(instrument = %instrument, error = %e, "instrument run failed");
            }
            InstrumentOutcome {
                instrument: instrument.clone(),
                result,
            }
        })
        .collect();
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(succeeded = outcomes.len() - failed, failed, "universe run complete");
    outcomes
}

/// Re-aggregate a stored observations file with the current aggregate
/// settings, persist, and publish.
pub fn aggregate_stored(
    config: &PipelineConfig,
    store: &DatasetStore,
    registry: &StatsRegistry,
    instrument: &str,
) -> Result<StatsTable, PipelineError> {
    let records = store.read_observations(instrument)?;
    let table = aggregate(instrument, &records, &config.aggregate);
    store.write_stats(&table)?;
    info!(
        instrument,
        observations = records.len(),
        states = table.len(),
        "aggregated stored observations"
    );
    registry.publish(table.clone());
    Ok(table)
}

/// A live classification of the latest bar and its lookup.
#[derive(Debug, Clone)]
pub struct LiveExpectation {
    pub classified: ClassifiedState,
    pub response: ExpectationResponse,
}

/// Classify the latest bar of an instrument with the supplied exogenous
/// context and serve the matching statistics.
///
/// The registry is consulted first, then the store; with neither holding a
/// table the response is `NotComputed`.
pub fn expect_live(
    config: &PipelineConfig,
    provider: &dyn HistoryProvider,
    store: &DatasetStore,
    registry: &StatsRegistry,
    instrument: &str,
    context: &ExogenousContext,
) -> Result<LiveExpectation, PipelineError> {
    let loaded = load_history(provider, instrument)?;
    let snapshot = compute_snapshot(&loaded.bars, &config.indicators)?;
    let classified = classify(&snapshot, context);

    let table = match registry.get(instrument) {
        Some(table) => Some(table),
        None => match store.load_stats(instrument)? {
            Some(stored) => {
                registry.publish(stored);
                registry.get(instrument)
            }
            None => None,
        },
    };
    let response = serve(instrument, &classified, table.as_deref());
    Ok(LiveExpectation {
        classified,
        response,
    })
}
