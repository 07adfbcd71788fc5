//! Pipeline configuration loaded from TOML.
//!
//! Every section has defaults, so an empty file is a valid config:
//!
//! ```toml
//! instruments = ["GLD", "SLV"]
//!
//! [data]
//! data_dir = "data"
//! output_dir = "output"
//! parallel = true
//!
//! [walk]
//! step = 1
//! warmup_bars = 220
//! forward_window = 20
//!
//! [aggregate]
//! min_samples = 10
//! granularity = "three_pillar"
//! exclude_defaults = false
//!
//! [indicators]
//! rsi_period = 14
//! swing_lookback = 2
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use statelab_core::aggregate::AggregateConfig;
use statelab_core::snapshot::SnapshotConfig;
use statelab_core::walk::{WalkConfig, DEFAULT_FORWARD_WINDOW, DEFAULT_WARMUP_BARS, FORWARD_HORIZONS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where histories come from and where datasets go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory of `<instrument>.csv` history files.
    pub data_dir: PathBuf,
    /// Directory for observation and stats datasets.
    pub output_dir: PathBuf,
    /// Walk dates on the rayon pool.
    pub parallel: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            parallel: true,
        }
    }
}

/// Date range and windows for the historical walk. Indicator periods live
/// in the `[indicators]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkSection {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub step: usize,
    pub warmup_bars: usize,
    pub forward_window: usize,
}

impl Default for WalkSection {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            step: 1,
            warmup_bars: DEFAULT_WARMUP_BARS,
            forward_window: DEFAULT_FORWARD_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub walk: WalkSection,
    pub aggregate: AggregateConfig,
    pub indicators: SnapshotConfig,
    /// Instruments to process. Empty means every history file in `data_dir`.
    pub instruments: Vec<String>,
}

impl PipelineConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let longest_horizon = FORWARD_HORIZONS[FORWARD_HORIZONS.len() - 1];

        if self.walk.step == 0 {
            return invalid("walk.step must be >= 1".into());
        }
        if self.walk.warmup_bars == 0 {
            return invalid("walk.warmup_bars must be >= 1".into());
        }
        if self.walk.forward_window < longest_horizon {
            return invalid(format!(
                "walk.forward_window must be >= {longest_horizon} (got {})",
                self.walk.forward_window
            ));
        }
        if let (Some(start), Some(end)) = (self.walk.start, self.walk.end) {
            if start > end {
                return invalid(format!("walk.start {start} is after walk.end {end}"));
            }
        }
        if self.aggregate.min_samples == 0 {
            return invalid("aggregate.min_samples must be >= 1".into());
        }

        let ind = &self.indicators;
        let periods = [
            ("rsi_period", ind.rsi_period),
            ("momentum_lookback", ind.momentum_lookback),
            ("macd_fast", ind.macd_fast),
            ("macd_slow", ind.macd_slow),
            ("macd_signal", ind.macd_signal),
            ("histogram_slope_lookback", ind.histogram_slope_lookback),
            ("adx_period", ind.adx_period),
            ("atr_period", ind.atr_period),
            ("sma_slope_lookback", ind.sma_slope_lookback),
            ("obv_sma_period", ind.obv_sma_period),
            ("obv_slope_window", ind.obv_slope_window),
            ("obv_momentum_lookback", ind.obv_momentum_lookback),
            ("up_down_lookback", ind.up_down_lookback),
            ("volume_average_window", ind.volume_average_window),
            ("swing_lookback", ind.swing_lookback),
            ("divergence_window", ind.divergence_window),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, v)| *v == 0) {
            return invalid(format!("indicators.{name} must be >= 1"));
        }
        if ind.macd_fast >= ind.macd_slow {
            return invalid(format!(
                "indicators.macd_fast ({}) must be below macd_slow ({})",
                ind.macd_fast, ind.macd_slow
            ));
        }

        if let Some(bad) = self.instruments.iter().find(|s| !is_valid_instrument(s)) {
            return invalid(format!("invalid instrument name '{bad}'"));
        }
        Ok(())
    }

    /// Walker configuration assembled from the walk and indicator sections.
    pub fn walk_config(&self) -> WalkConfig {
        WalkConfig {
            start: self.walk.start,
            end: self.walk.end,
            step: self.walk.step,
            warmup_bars: self.walk.warmup_bars,
            forward_window: self.walk.forward_window,
            snapshot: self.indicators.clone(),
        }
    }

    /// BLAKE3 over the config JSON and the dataset hash. Two runs with the
    /// same fingerprint produce identical datasets.
    pub fn fingerprint(&self, dataset_hash: &str) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(json.as_bytes());
        hasher.update(dataset_hash.as_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// Instrument names become file names; keep them to a safe alphabet.
pub fn is_valid_instrument(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '^' | '='))
        && !name.starts_with('.')
}
