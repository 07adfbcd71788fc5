//! Dataset store: observation and stats tables as CSV files.
//!
//! Layout under the store directory:
//! - `observations_<instrument>.csv`: one row per walked date
//! - `stats_<instrument>.csv`: one row per state key
//!
//! The stats file starts with a metadata comment line carrying the key
//! scheme version, granularity, and minimum sample count, followed by a
//! normal header row. Writes go to a `.tmp` sibling and are renamed into
//! place, so a reader never sees a half-written file.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use statelab_core::aggregate::{StateStats, StatsTable};
use statelab_core::encode::{Granularity, StateKey, KEY_SCHEME_VERSION};
use statelab_core::walk::ObservationRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unsupported key scheme version {found} in {path} (supported: {supported})")]
    UnsupportedKeyVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("malformed dataset {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

const META_PREFIX: &str = "# statelab";

/// File-backed dataset store rooted at one directory.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    dir: PathBuf,
}

impl DatasetStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn observations_path(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("observations_{instrument}.csv"))
    }

    pub fn stats_path(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("stats_{instrument}.csv"))
    }

    // ── Observations ──

    pub fn write_observations(
        &self,
        instrument: &str,
        records: &[ObservationRecord],
    ) -> Result<PathBuf, StoreError> {
        let path = self.observations_path(instrument);
        write_atomic(&path, |w| {
            let mut wtr = csv::Writer::from_writer(w);
            for record in records {
                wtr.serialize(record)?;
            }
            wtr.flush()?;
            Ok(())
        })?;
        info!(instrument, rows = records.len(), path = %path.display(), "wrote observations");
        Ok(path)
    }

    pub fn read_observations(&self, instrument: &str) -> Result<Vec<ObservationRecord>, StoreError> {
        let path = self.observations_path(instrument);
        let text = read_text(&path)?;
        let mut rdr = csv::Reader::from_reader(text.as_bytes());
        let mut records = Vec::new();
        for row in rdr.deserialize::<ObservationRecord>() {
            let record = row.map_err(|source| StoreError::Csv {
                path: path.clone(),
                source,
            })?;
            if record.key_version != KEY_SCHEME_VERSION {
                return Err(StoreError::UnsupportedKeyVersion {
                    path,
                    found: record.key_version,
                    supported: KEY_SCHEME_VERSION,
                });
            }
            records.push(record);
        }
        Ok(records)
    }

    // ── Stats ──

    pub fn write_stats(&self, table: &StatsTable) -> Result<PathBuf, StoreError> {
        let path = self.stats_path(&table.instrument);
        let meta = StatsMeta {
            key_version: table.key_version,
            granularity: table.granularity,
            min_samples: table.min_samples,
        };
        write_atomic(&path, |w| {
            writeln!(w, "{}", meta.to_line())?;
            let mut wtr = csv::Writer::from_writer(w);
            for row in &table.rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
            Ok(())
        })?;
        info!(
            instrument = %table.instrument,
            states = table.rows.len(),
            path = %path.display(),
            "wrote stats"
        );
        Ok(path)
    }

    /// Load an instrument's stats table. `Ok(None)` when none has been
    /// computed yet.
    pub fn load_stats(&self, instrument: &str) -> Result<Option<StatsTable>, StoreError> {
        let path = self.stats_path(instrument);
        if !path.exists() {
            return Ok(None);
        }
        let text = read_text(&path)?;
        let first = text.lines().next().unwrap_or("");
        let meta = StatsMeta::parse(first).map_err(|reason| StoreError::Malformed {
            path: path.clone(),
            reason,
        })?;
        if meta.key_version != KEY_SCHEME_VERSION {
            return Err(StoreError::UnsupportedKeyVersion {
                path,
                found: meta.key_version,
                supported: KEY_SCHEME_VERSION,
            });
        }

        let mut rdr = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .from_reader(text.as_bytes());
        let mut rows = Vec::new();
        for row in rdr.deserialize::<StateStats>() {
            let stats = row.map_err(|source| StoreError::Csv {
                path: path.clone(),
                source,
            })?;
            match StateKey::parse(&stats.key) {
                Some(key) if key.granularity() == meta.granularity => rows.push(stats),
                _ => {
                    return Err(StoreError::Malformed {
                        path,
                        reason: format!(
                            "key '{}' is not a {} key",
                            stats.key,
                            meta.granularity.label()
                        ),
                    })
                }
            }
        }

        Ok(Some(StatsTable {
            instrument: instrument.to_string(),
            key_version: meta.key_version,
            granularity: meta.granularity,
            min_samples: meta.min_samples,
            rows,
        }))
    }

    /// Instruments that have a stats file, sorted.
    pub fn stats_instruments(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_str()?.to_string();
                let inst = name.strip_prefix("stats_")?.strip_suffix(".csv")?;
                Some(inst.to_string())
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

struct StatsMeta {
    key_version: u32,
    granularity: Granularity,
    min_samples: usize,
}

impl StatsMeta {
    fn to_line(&self) -> String {
        format!(
            "{META_PREFIX} key_version={} granularity={} min_samples={}",
            self.key_version,
            self.granularity.label(),
            self.min_samples
        )
    }

    fn parse(line: &str) -> Result<Self, String> {
        let rest = line
            .strip_prefix(META_PREFIX)
            .ok_or_else(|| "missing metadata line".to_string())?;
        let mut key_version = None;
        let mut granularity = None;
        let mut min_samples = None;
        for pair in rest.split_whitespace() {
            let Some((k, v)) = pair.split_once('=') else {
                continue;
            };
            match k {
                "key_version" => key_version = v.parse().ok(),
                "granularity" => granularity = Granularity::from_label(v),
                "min_samples" => min_samples = v.parse().ok(),
                _ => {}
            }
        }
        Ok(Self {
            key_version: key_version.ok_or("missing key_version")?,
            granularity: granularity.ok_or("missing granularity")?,
            min_samples: min_samples.ok_or("missing min_samples")?,
        })
    }
}

fn read_text(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write through a temp file and rename into place.
fn write_atomic<F>(path: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut BufWriter<fs::File>) -> Result<(), WriteFailure>,
{
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp_path = path.with_extension("csv.tmp");
    let file = fs::File::create(&tmp_path).map_err(io_err)?;
    let mut w = BufWriter::new(file);

    let result = write(&mut w)
        .and_then(|()| w.flush().map_err(WriteFailure::Io))
        .map_err(|e| e.into_store_error(path));
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    drop(w);

    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

enum WriteFailure {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl WriteFailure {
    fn into_store_error(self, path: &Path) -> StoreError {
        let path = path.to_path_buf();
        match self {
            WriteFailure::Io(source) => StoreError::Io { path, source },
            WriteFailure::Csv(source) => StoreError::Csv { path, source },
        }
    }
}

impl From<std::io::Error> for WriteFailure {
    fn from(e: std::io::Error) -> Self {
        WriteFailure::Io(e)
    }
}

impl From<csv::Error> for WriteFailure {
    fn from(e: csv::Error) -> Self {
        WriteFailure::Csv(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statelab_core::aggregate::{aggregate, AggregateConfig};
    use statelab_core::domain::{
        MarketState, Momentum, Participation, Positioning, Regime, Tailwind,
    };
    use chrono::NaiveDate;

    fn record(day: u32, regime: Regime, ret: f64) -> ObservationRecord {
        let state = MarketState {
            regime,
            momentum: Momentum::Steady,
            participation: Participation::Neutral,
            tailwind: Tailwind::Neutral,
            positioning: Positioning::Unknown,
        };
        ObservationRecord {
            instrument: "GLD".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            close: 100.0 + day as f64,
            regime,
            momentum: state.momentum,
            participation: state.participation,
            tailwind: state.tailwind,
            positioning: state.positioning,
            key_version: KEY_SCHEME_VERSION,
            key_3: StateKey::three(&state).code(),
            key_5: StateKey::five(&state).code(),
            return_5d: Some(ret),
            return_10d: Some(ret * 2.0),
            return_20d: Some(ret * 3.0),
            mae_5d: Some(-1.0),
            mfe_5d: Some(2.0),
            mae_20d: Some(-2.5),
            mfe_20d: Some(4.0),
            valid: true,
            used_defaults: true,
        }
    }

    #[test]
    fn observations_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let records = vec![record(2, Regime::Uptrend, 1.5), record(3, Regime::Range, -0.25)];

        let path = store.write_observations("GLD", &records).unwrap();
        assert!(path.ends_with("observations_GLD.csv"));
        assert!(!path.with_extension("csv.tmp").exists());

        let back = store.read_observations("GLD").unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn observation_file_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        store.write_observations("GLD", &[record(2, Regime::Uptrend, 1.0)]).unwrap();
        let text = fs::read_to_string(store.observations_path("GLD")).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("instrument,date,close,regime"));
        assert!(text.contains(",uptrend,steady,neutral,"));
    }

    #[test]
    fn stats_round_trip_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let records: Vec<_> = (1..=12).map(|d| record(d, Regime::Uptrend, d as f64 * 0.1)).collect();
        let cfg = AggregateConfig {
            min_samples: 5,
            ..AggregateConfig::default()
        };
        let table = aggregate("GLD", &records, &cfg);
        assert_eq!(table.len(), 1);

        store.write_stats(&table).unwrap();
        let text = fs::read_to_string(store.stats_path("GLD")).unwrap();
        assert!(text.starts_with("# statelab key_version=1 granularity=three_pillar min_samples=5"));

        let back = store.load_stats("GLD").unwrap().unwrap();
        assert_eq!(back.min_samples, 5);
        assert_eq!(back.granularity, Granularity::ThreePillar);
        assert_eq!(back.rows.len(), 1);
        assert_eq!(back.rows[0].key, "Ru_Ms_Pn");
        assert_eq!(back.rows[0].n_samples, 12);
        assert!((back.rows[0].mean_5d - table.rows[0].mean_5d).abs() < 1e-12);
        assert_eq!(back.rows[0].edge_class, table.rows[0].edge_class);
    }

    #[test]
    fn missing_stats_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        assert!(store.load_stats("SLV").unwrap().is_none());
        assert!(store.stats_instruments().unwrap().is_empty());
    }

    #[test]
    fn rejects_unsupported_key_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        fs::write(
            store.stats_path("GLD"),
            "# statelab key_version=99 granularity=three_pillar min_samples=10\nkey\n",
        )
        .unwrap();
        assert!(matches!(
            store.load_stats("GLD"),
            Err(StoreError::UnsupportedKeyVersion { found: 99, .. })
        ));
    }

    #[test]
    fn rejects_observations_from_other_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let mut old = record(2, Regime::Uptrend, 1.0);
        old.key_version = 0;
        store.write_observations("GLD", &[old]).unwrap();
        assert!(matches!(
            store.read_observations("GLD"),
            Err(StoreError::UnsupportedKeyVersion { found: 0, .. })
        ));
    }

    #[test]
    fn rejects_missing_metadata_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        fs::write(store.stats_path("GLD"), "key,n_samples\n").unwrap();
        assert!(matches!(
            store.load_stats("GLD"),
            Err(StoreError::Malformed { .. })
        ));
    }

    #[test]
    fn lists_instruments_with_stats() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        for inst in ["SLV", "GLD"] {
            let table = aggregate(inst, &[], &AggregateConfig::default());
            store.write_stats(&table).unwrap();
        }
        assert_eq!(store.stats_instruments().unwrap(), vec!["GLD", "SLV"]);
        assert!(store.load_stats("GLD").unwrap().unwrap().is_empty());
    }
}
