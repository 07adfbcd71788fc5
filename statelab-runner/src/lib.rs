//! StateLab Runner: orchestration around the `statelab-core` engine.
//!
//! This crate provides:
//! - TOML pipeline configuration with validation and run fingerprints
//! - CSV history loading
//! - Parallel historical walks (rayon)
//! - Observation and stats datasets on disk (atomic CSV writes)
//! - A swap-on-publish stats registry for live lookups
//! - Text and markdown reports

pub mod config;
pub mod data_loader;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod store;

pub use config::{ConfigError, DataConfig, PipelineConfig, WalkSection};
pub use data_loader::{load_history, CsvHistoryProvider, LoadError, LoadedHistory};
pub use pipeline::{
    aggregate_stored, expect_live, run_instrument, run_universe, walk_parallel, InstrumentOutcome,
    InstrumentRun, LiveExpectation, PipelineError,
};
pub use registry::StatsRegistry;
pub use store::{DatasetStore, StoreError};
