//! Historical walk: replays the classifier over past dates and attaches
//! realized forward outcomes.
//!
//! For each walked date D at bar index `i`, the snapshot, state, and keys
//! are computed from `bars[..=i]` only. Forward metrics are the only values
//! that read past `i`, and they are labels, never inputs.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::classify::classify;
use crate::context::ExogenousContext;
use crate::domain::{Bar, MarketState, Momentum, Participation, Positioning, Regime, Tailwind};
use crate::encode::{Granularity, StateKey, KEY_SCHEME_VERSION};
use crate::snapshot::{compute_snapshot, SnapshotConfig};

pub const DEFAULT_WARMUP_BARS: usize = 220;
pub const DEFAULT_FORWARD_WINDOW: usize = 20;
/// Bar offsets at which forward returns are measured.
pub const FORWARD_HORIZONS: [usize; 3] = [5, 10, 20];
/// Bar windows over which adverse/favorable excursion is measured.
pub const EXCURSION_WINDOWS: [usize; 2] = [5, 20];

#[derive(Debug, Error, PartialEq)]
pub enum WalkError {
    #[error("insufficient history: {available} bars available, {required} required")]
    InsufficientHistory { available: usize, required: usize },

    #[error("invalid walk config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Walk every `step`-th bar.
    pub step: usize,
    pub warmup_bars: usize,
    pub forward_window: usize,
    pub snapshot: SnapshotConfig,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            step: 1,
            warmup_bars: DEFAULT_WARMUP_BARS,
            forward_window: DEFAULT_FORWARD_WINDOW,
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl WalkConfig {
    pub fn required_bars(&self) -> usize {
        self.warmup_bars + self.forward_window
    }
}

/// Realized outcomes after D. Every field is `None` when its window runs
/// past the end of the series. Values are percent of D's close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ForwardMetrics {
    pub return_5d: Option<f64>,
    pub return_10d: Option<f64>,
    pub return_20d: Option<f64>,
    pub mae_5d: Option<f64>,
    pub mfe_5d: Option<f64>,
    pub mae_20d: Option<f64>,
    pub mfe_20d: Option<f64>,
}

/// One walked date. Flat so it maps directly onto a CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub instrument: String,
    pub date: NaiveDate,
    pub close: f64,
    pub regime: Regime,
    pub momentum: Momentum,
    pub participation: Participation,
    pub tailwind: Tailwind,
    pub positioning: Positioning,
    pub key_version: u32,
    pub key_3: String,
    pub key_5: String,
    pub return_5d: Option<f64>,
    pub return_10d: Option<f64>,
    pub return_20d: Option<f64>,
    pub mae_5d: Option<f64>,
    pub mfe_5d: Option<f64>,
    pub mae_20d: Option<f64>,
    pub mfe_20d: Option<f64>,
    /// True when the full forward window exists.
    pub valid: bool,
    /// True when a placeholder stood in for exogenous data.
    pub used_defaults: bool,
}

impl ObservationRecord {
    pub fn state(&self) -> MarketState {
        MarketState {
            regime: self.regime,
            momentum: self.momentum,
            participation: self.participation,
            tailwind: self.tailwind,
            positioning: self.positioning,
        }
    }

    /// Key text at the requested granularity.
    pub fn key(&self, granularity: Granularity) -> &str {
        match granularity {
            Granularity::ThreePillar => &self.key_3,
            Granularity::FivePillar => &self.key_5,
        }
    }

    pub fn forward(&self) -> ForwardMetrics {
        ForwardMetrics {
            return_5d: self.return_5d,
            return_10d: self.return_10d,
            return_20d: self.return_20d,
            mae_5d: self.mae_5d,
            mfe_5d: self.mfe_5d,
            mae_20d: self.mae_20d,
            mfe_20d: self.mfe_20d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The bar at D is void or fails the OHLC sanity check.
    InvalidBar,
    Indicator(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkReport {
    pub instrument: String,
    /// Ordered by date.
    pub records: Vec<ObservationRecord>,
    pub skipped: Vec<SkippedDate>,
}

/// Bar indices to walk, in order.
///
/// Fails before any work if the series is shorter than warm-up plus the
/// forward window. A prefix `bars[..=i]` shorter than the warm-up is never
/// walked.
pub fn walk_indices(bars: &[Bar], cfg: &WalkConfig) -> Result<Vec<usize>, WalkError> {
    if cfg.step == 0 {
        return Err(WalkError::InvalidConfig("step must be >= 1".into()));
    }
    let required = cfg.required_bars();
    if bars.len() < required {
        return Err(WalkError::InsufficientHistory {
            available: bars.len(),
            required,
        });
    }

    let first = match cfg.start {
        Some(start) => bars.partition_point(|b| b.date < start),
        None => cfg.warmup_bars,
    };
    let last = match cfg.end {
        Some(end) => bars.partition_point(|b| b.date <= end).checked_sub(1),
        None => Some(bars.len() - cfg.forward_window - 1),
    };
    let Some(last) = last else {
        return Ok(Vec::new());
    };

    Ok((first..=last)
        .step_by(cfg.step)
        .filter(|&i| i + 1 >= cfg.warmup_bars)
        .collect())
}

/// Observe the single date at index `i`, reading `bars[..=i]` for state and
/// the rest of the series only for forward metrics.
pub fn observe_at(
    instrument: &str,
    bars: &[Bar],
    i: usize,
    cfg: &WalkConfig,
    context: &ExogenousContext,
) -> Result<ObservationRecord, SkippedDate> {
    let bar = &bars[i];
    if !bar.is_sane() {
        return Err(SkippedDate {
            date: bar.date,
            reason: SkipReason::InvalidBar,
        });
    }

    let prefix = &bars[..=i];
    let snapshot = compute_snapshot(prefix, &cfg.snapshot).map_err(|e| SkippedDate {
        date: bar.date,
        reason: SkipReason::Indicator(e.to_string()),
    })?;
    let classified = classify(&snapshot, context);
    let state = classified.state;
    let fwd = forward_metrics(bars, i);

    Ok(ObservationRecord {
        instrument: instrument.to_string(),
        date: bar.date,
        close: bar.close,
        regime: state.regime,
        momentum: state.momentum,
        participation: state.participation,
        tailwind: state.tailwind,
        positioning: state.positioning,
        key_version: KEY_SCHEME_VERSION,
        key_3: StateKey::three(&state).code(),
        key_5: StateKey::five(&state).code(),
        return_5d: fwd.return_5d,
        return_10d: fwd.return_10d,
        return_20d: fwd.return_20d,
        mae_5d: fwd.mae_5d,
        mfe_5d: fwd.mfe_5d,
        mae_20d: fwd.mae_20d,
        mfe_20d: fwd.mfe_20d,
        valid: i + cfg.forward_window < bars.len(),
        used_defaults: classified.used_defaults,
    })
}

/// Forward returns and excursions from D's close.
pub fn forward_metrics(bars: &[Bar], i: usize) -> ForwardMetrics {
    let base = bars[i].close;
    let pct = |v: f64| (v - base) / base * 100.0;

    let ret = |h: usize| {
        bars.get(i + h)
            .map(|b| b.close)
            .filter(|c| c.is_finite())
            .map(pct)
    };
    let excursion = |h: usize| -> Option<(f64, f64)> {
        let window = bars.get(i..=i + h)?;
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for b in window {
            if !b.close.is_finite() {
                return None;
            }
            lo = lo.min(b.close);
            hi = hi.max(b.close);
        }
        Some((pct(lo), pct(hi)))
    };

    let [h5, h10, h20] = FORWARD_HORIZONS;
    let [w5, w20] = EXCURSION_WINDOWS;
    let ex5 = excursion(w5);
    let ex20 = excursion(w20);
    ForwardMetrics {
        return_5d: ret(h5),
        return_10d: ret(h10),
        return_20d: ret(h20),
        mae_5d: ex5.map(|e| e.0),
        mfe_5d: ex5.map(|e| e.1),
        mae_20d: ex20.map(|e| e.0),
        mfe_20d: ex20.map(|e| e.1),
    }
}

/// Walk the whole series sequentially.
pub fn walk_history(
    instrument: &str,
    bars: &[Bar],
    cfg: &WalkConfig,
    context: &ExogenousContext,
) -> Result<WalkReport, WalkError> {
    let indices = walk_indices(bars, cfg)?;
    let mut report = WalkReport {
        instrument: instrument.to_string(),
        records: Vec::with_capacity(indices.len()),
        skipped: Vec::new(),
    };
    for i in indices {
        match observe_at(instrument, bars, i, cfg, context) {
            Ok(record) => report.records.push(record),
            Err(skip) => {
                debug!(instrument, date = %skip.date, reason = ?skip.reason, "skipped date");
                report.skipped.push(skip);
            }
        }
    }
    Ok(report)
}

/// Totals and state distribution of a walk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkSummary {
    pub total: usize,
    pub valid: usize,
    pub skipped: usize,
    pub used_defaults: usize,
    pub unique_states: usize,
    /// Three-pillar key text to observation count.
    pub distribution: BTreeMap<String, usize>,
    pub mean_return_5d: Option<f64>,
    pub mean_return_10d: Option<f64>,
    pub mean_return_20d: Option<f64>,
    pub hit_rate_5d: Option<f64>,
}

pub fn summarize(report: &WalkReport) -> WalkSummary {
    let mut distribution = BTreeMap::new();
    for r in &report.records {
        *distribution.entry(r.key_3.clone()).or_insert(0) += 1;
    }
    let valid: Vec<&ObservationRecord> = report.records.iter().filter(|r| r.valid).collect();
    let mean = |f: fn(&ObservationRecord) -> Option<f64>| {
        let xs: Vec<f64> = valid.iter().filter_map(|r| f(r)).collect();
        (!xs.is_empty()).then(|| xs.iter().sum::<f64>() / xs.len() as f64)
    };
    let r5: Vec<f64> = valid.iter().filter_map(|r| r.return_5d).collect();
    let hit_rate_5d = (!r5.is_empty())
        .then(|| r5.iter().filter(|v| **v > 0.0).count() as f64 / r5.len() as f64 * 100.0);

    WalkSummary {
        total: report.records.len(),
        valid: valid.len(),
        skipped: report.skipped.len(),
        used_defaults: report.records.iter().filter(|r| r.used_defaults).count(),
        unique_states: distribution.len(),
        distribution,
        mean_return_5d: mean(|r| r.return_5d),
        mean_return_10d: mean(|r| r.return_10d),
        mean_return_20d: mean(|r| r.return_20d),
        hit_rate_5d,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    fn small_cfg() -> WalkConfig {
        WalkConfig {
            warmup_bars: 30,
            forward_window: 20,
            ..WalkConfig::default()
        }
    }

    fn rising(n: usize) -> Vec<Bar> {
        make_bars(&(0..n).map(|i| 100.0 + i as f64).collect::<Vec<_>>())
    }

    #[test]
    fn short_series_is_fatal() {
        let err = walk_history("GLD", &rising(49), &small_cfg(), &ExogenousContext::default()).unwrap_err();
        assert_eq!(
            err,
            WalkError::InsufficientHistory {
                available: 49,
                required: 50
            }
        );
    }

    #[test]
    fn zero_step_is_rejected() {
        let cfg = WalkConfig {
            step: 0,
            ..small_cfg()
        };
        assert!(matches!(walk_indices(&rising(100), &cfg), Err(WalkError::InvalidConfig(_))));
    }

    #[test]
    fn default_range_spans_warmup_to_last_complete_window() {
        let bars = rising(100);
        let idx = walk_indices(&bars, &small_cfg()).unwrap();
        assert_eq!(idx.first(), Some(&30));
        assert_eq!(idx.last(), Some(&79));
        let stepped = walk_indices(&bars, &WalkConfig { step: 10, ..small_cfg() }).unwrap();
        assert_eq!(stepped, vec![30, 40, 50, 60, 70]);
    }

    #[test]
    fn explicit_start_before_warmup_is_clamped() {
        let bars = rising(100);
        let cfg = WalkConfig {
            start: Some(bars[5].date),
            end: Some(bars[40].date),
            ..small_cfg()
        };
        let idx = walk_indices(&bars, &cfg).unwrap();
        // bars[..=29] is exactly the 30-bar warm-up.
        assert_eq!(idx.first(), Some(&29));
        assert_eq!(idx.last(), Some(&40));
    }

    #[test]
    fn prefix_of_exactly_warmup_bars_is_walked() {
        let bars = rising(100);
        let walked = |start: usize| {
            let cfg = WalkConfig {
                start: Some(bars[start].date),
                end: Some(bars[35].date),
                ..small_cfg()
            };
            walk_indices(&bars, &cfg).unwrap()
        };
        assert_eq!(walked(29).first(), Some(&29));
        assert_eq!(walked(28).first(), Some(&29));
        assert_eq!(walked(30).first(), Some(&30));

        let cfg = WalkConfig {
            start: Some(bars[29].date),
            end: Some(bars[29].date),
            ..small_cfg()
        };
        let report = walk_history("T", &bars, &cfg, &ExogenousContext::historical_default()).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].date, bars[29].date);
    }

    #[test]
    fn forward_metrics_on_known_path() {
        let closes: Vec<f64> = vec![100.0, 98.0, 103.0, 101.0, 99.0, 105.0, 110.0];
        let bars = make_bars(&closes);
        let f = forward_metrics(&bars, 0);
        assert_approx(f.return_5d.unwrap(), 5.0, 1e-9);
        assert_approx(f.mae_5d.unwrap(), -2.0, 1e-9);
        assert_approx(f.mfe_5d.unwrap(), 5.0, 1e-9);
        assert_eq!(f.return_10d, None);
        assert_eq!(f.mae_20d, None);
    }

    #[test]
    fn end_past_forward_window_marks_rows_invalid() {
        let bars = rising(100);
        let cfg = WalkConfig {
            start: Some(bars[75].date),
            end: Some(bars[99].date),
            ..small_cfg()
        };
        let report = walk_history("GLD", &bars, &cfg, &ExogenousContext::default()).unwrap();
        assert_eq!(report.records.len(), 25);
        let valid = report.records.iter().filter(|r| r.valid).count();
        assert_eq!(valid, 5);
        let last = report.records.last().unwrap();
        assert!(!last.valid);
        assert_eq!(last.return_5d, None);
    }

    #[test]
    fn insane_bar_is_recorded_as_skip() {
        let mut bars = rising(100);
        bars[40].high = bars[40].low - 1.0;
        let report = walk_history("GLD", &bars, &small_cfg(), &ExogenousContext::default()).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].date, bars[40].date);
        assert_eq!(report.skipped[0].reason, SkipReason::InvalidBar);
        assert_eq!(report.records.len(), 49);
    }

    #[test]
    fn every_record_is_flagged_with_defaults() {
        let report = walk_history("GLD", &rising(80), &small_cfg(), &ExogenousContext::default()).unwrap();
        assert!(report.records.iter().all(|r| r.used_defaults));
        assert!(report.records.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn summary_counts_states() {
        let report = walk_history("GLD", &rising(80), &small_cfg(), &ExogenousContext::default()).unwrap();
        let s = summarize(&report);
        assert_eq!(s.total, report.records.len());
        assert_eq!(s.valid, s.total);
        assert_eq!(s.distribution.values().sum::<usize>(), s.total);
        assert_eq!(s.hit_rate_5d, Some(100.0));
        assert!(s.mean_return_5d.unwrap() > 0.0);
    }
}
