//! Collaborator traits and structured error types.
//!
//! Price history, macro backdrop, and positioning each sit behind a trait so
//! the pipeline can swap sources and tests can mock them. Providers know
//! nothing about caching; [`super::cache`] wraps them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::context::MacroContext;
use crate::domain::Bar;

/// Daily OHLCV row as delivered by a source, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Absent for sources without volume; zero-filled at ingest.
    pub volume: Option<f64>,
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("instrument not found: {instrument}")]
    InstrumentNotFound { instrument: String },

    #[error("duplicate bar for {instrument} on {date}")]
    DuplicateDate { instrument: String, date: NaiveDate },

    #[error("no usable bars for {instrument}")]
    Empty { instrument: String },

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Price history source.
pub trait HistoryProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Full daily history for an instrument, in any order.
    fn history(&self, instrument: &str) -> Result<Vec<RawBar>, DataError>;
}

/// Macro backdrop source (currency and real-yield proxies).
pub trait MacroContextProvider: Send + Sync {
    fn macro_context(&self, as_of: NaiveDate) -> Result<MacroContext, DataError>;
}

/// Speculative positioning source.
pub trait PositioningProvider: Send + Sync {
    /// Positioning percentile (0..=100), `None` when the instrument has no
    /// positioning report.
    fn percentile(&self, instrument: &str) -> Result<Option<f64>, DataError>;
}

/// Validate raw rows into a chronological bar series.
///
/// Rows are sorted by date; a repeated date is an error. Rows with a
/// non-finite price are dropped with a warning. Missing volume becomes 0.
pub fn ingest(instrument: &str, mut raw: Vec<RawBar>) -> Result<Vec<Bar>, DataError> {
    raw.sort_by_key(|r| r.date);
    if let Some(pair) = raw.windows(2).find(|w| w[0].date == w[1].date) {
        return Err(DataError::DuplicateDate {
            instrument: instrument.to_string(),
            date: pair[0].date,
        });
    }

    let mut dropped = 0usize;
    let bars: Vec<Bar> = raw
        .into_iter()
        .map(|r| Bar {
            date: r.date,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume.filter(|v| v.is_finite()).unwrap_or(0.0),
        })
        .filter(|b| {
            let keep = !b.is_void();
            if !keep {
                dropped += 1;
            }
            keep
        })
        .collect();

    if dropped > 0 {
        warn!(instrument, dropped, "dropped bars with non-finite prices");
    }
    if bars.is_empty() {
        return Err(DataError::Empty {
            instrument: instrument.to_string(),
        });
    }
    Ok(bars)
}

/// In-memory history source.
#[derive(Debug, Clone, Default)]
pub struct StaticHistory {
    series: std::collections::HashMap<String, Vec<RawBar>>,
}

impl StaticHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, instrument: impl Into<String>, bars: Vec<RawBar>) -> Self {
        self.series.insert(instrument.into(), bars);
        self
    }
}

impl HistoryProvider for StaticHistory {
    fn name(&self) -> &str {
        "static"
    }

    fn history(&self, instrument: &str) -> Result<Vec<RawBar>, DataError> {
        self.series
            .get(instrument)
            .cloned()
            .ok_or_else(|| DataError::InstrumentNotFound {
                instrument: instrument.to_string(),
            })
    }
}
