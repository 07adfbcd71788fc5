//! History loading for the runner.
//!
//! [`CsvHistoryProvider`] reads one `<instrument>.csv` per instrument with a
//! `Date,Open,High,Low,Close[,Volume]` header (column names are matched
//! case-insensitively, extra columns are ignored). Blank or unparseable price
//! cells become `NaN` and the row is dropped at ingest; a bad date is an
//! error.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::info;

use statelab_core::data::{ingest, DataError, HistoryProvider, RawBar};
use statelab_core::domain::Bar;

use crate::config::is_valid_instrument;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("no history files found in {dir}")]
    NoInstruments { dir: PathBuf },
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// History source backed by a directory of CSV files.
#[derive(Debug, Clone)]
pub struct CsvHistoryProvider {
    dir: PathBuf,
}

impl CsvHistoryProvider {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("{instrument}.csv"))
    }

    /// Instruments with a history file, sorted.
    pub fn instruments(&self) -> Result<Vec<String>, LoadError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::NoInstruments {
                    dir: self.dir.clone(),
                })
            }
            Err(e) => return Err(DataError::Io(e).into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(DataError::Io)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_valid_instrument(stem) {
                    names.push(stem.to_string());
                }
            }
        }
        if names.is_empty() {
            return Err(LoadError::NoInstruments {
                dir: self.dir.clone(),
            });
        }
        names.sort();
        Ok(names)
    }
}

impl HistoryProvider for CsvHistoryProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn history(&self, instrument: &str) -> Result<Vec<RawBar>, DataError> {
        let path = self.path_for(instrument);
        if !path.is_file() {
            return Err(DataError::InstrumentNotFound {
                instrument: instrument.to_string(),
            });
        }
        let file = std::fs::File::open(&path)?;
        read_history_csv(file)
    }
}

struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, DataError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| DataError::Malformed(format!("missing '{name}' column")))
        };
        Ok(Self {
            date: require("date")?,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
        })
    }
}

/// Parse `Date,Open,High,Low,Close[,Volume]` rows from any reader.
pub fn read_history_csv<R: std::io::Read>(reader: R) -> Result<Vec<RawBar>, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| DataError::Malformed(format!("header: {e}")))?
        .clone();
    let cols = Columns::from_headers(&headers)?;

    let mut bars = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| DataError::Malformed(format!("row {}: {e}", row + 1)))?;
        let date_text = record.get(cols.date).unwrap_or("");
        let date = parse_date(date_text).ok_or_else(|| {
            DataError::Malformed(format!("row {}: bad date '{date_text}'", row + 1))
        })?;
        let price = |i: usize| parse_number(record.get(i)).unwrap_or(f64::NAN);
        bars.push(RawBar {
            date,
            open: price(cols.open),
            high: price(cols.high),
            low: price(cols.low),
            close: price(cols.close),
            volume: cols.volume.and_then(|i| parse_number(record.get(i))),
        });
    }
    Ok(bars)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    // Timestamps like "2024-01-02 00:00:00" keep only the date part.
    let day = text.split_whitespace().next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
}

fn parse_number(cell: Option<&str>) -> Option<f64> {
    let cell = cell?.trim();
    if cell.is_empty() {
        return None;
    }
    cell.replace(',', "").parse::<f64>().ok()
}

/// A validated series ready to walk.
#[derive(Debug, Clone)]
pub struct LoadedHistory {
    pub instrument: String,
    pub bars: Vec<Bar>,
    /// BLAKE3 over every bar, for fingerprinting.
    pub dataset_hash: String,
}

/// Fetch and validate one instrument's history.
pub fn load_history(provider: &dyn HistoryProvider, instrument: &str) -> Result<LoadedHistory, LoadError> {
    let raw = provider.history(instrument)?;
    let bars = ingest(instrument, raw)?;
    let dataset_hash = compute_dataset_hash(instrument, &bars);
    info!(
        instrument,
        source = provider.name(),
        bars = bars.len(),
        first = %bars[0].date,
        last = %bars[bars.len() - 1].date,
        "loaded history"
    );
    Ok(LoadedHistory {
        instrument: instrument.to_string(),
        bars,
        dataset_hash,
    })
}

/// Deterministic BLAKE3 hash over an instrument's bars.
pub fn compute_dataset_hash(instrument: &str, bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(instrument.as_bytes());
    for bar in bars {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
