//! Aggregation: reduces observation records to per-state outcome
//! statistics.
//!
//! Rows are recomputed wholesale on every run. Groups with fewer than
//! `min_samples` observations are dropped, not flagged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::rules::{first_match, Rule};
use crate::encode::{Granularity, StateKey, KEY_SCHEME_VERSION};
use crate::walk::ObservationRecord;

pub const DEFAULT_MIN_SAMPLES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    pub min_samples: usize,
    pub granularity: Granularity,
    /// Drop rows whose exogenous pillars came from placeholders.
    pub exclude_defaults: bool,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_MIN_SAMPLES,
            granularity: Granularity::ThreePillar,
            exclude_defaults: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeClass {
    StrongBullish,
    Bullish,
    StrongBearish,
    Bearish,
    AsymmetricBullish,
    AsymmetricBearish,
    Neutral,
}

impl EdgeClass {
    pub fn label(self) -> &'static str {
        match self {
            EdgeClass::StrongBullish => "strong_bullish",
            EdgeClass::Bullish => "bullish",
            EdgeClass::StrongBearish => "strong_bearish",
            EdgeClass::Bearish => "bearish",
            EdgeClass::AsymmetricBullish => "asymmetric_bullish",
            EdgeClass::AsymmetricBearish => "asymmetric_bearish",
            EdgeClass::Neutral => "neutral",
        }
    }
}

/// Per-state outcome statistics. Returns and excursions are percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateStats {
    pub key: String,
    pub n_samples: usize,
    pub mean_5d: f64,
    pub median_5d: f64,
    pub std_5d: f64,
    pub min_5d: f64,
    pub max_5d: f64,
    pub hit_rate_5d: f64,
    pub mean_10d: f64,
    pub median_10d: f64,
    pub std_10d: f64,
    pub min_10d: f64,
    pub max_10d: f64,
    pub hit_rate_10d: f64,
    pub mean_20d: f64,
    pub median_20d: f64,
    pub std_20d: f64,
    pub min_20d: f64,
    pub max_20d: f64,
    pub hit_rate_20d: f64,
    pub avg_mae_5d: f64,
    pub median_mae_5d: f64,
    pub worst_mae_5d: f64,
    pub avg_mfe_5d: f64,
    pub median_mfe_5d: f64,
    pub best_mfe_5d: f64,
    pub avg_mae_20d: f64,
    pub avg_mfe_20d: f64,
    pub confidence: f64,
    pub risk_reward_5d: f64,
    pub expectancy_5d: f64,
    pub edge_class: EdgeClass,
}

impl StateStats {
    pub fn state_key(&self) -> Option<StateKey> {
        StateKey::parse(&self.key)
    }
}

/// Aggregated statistics for one instrument at one granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsTable {
    pub instrument: String,
    pub key_version: u32,
    pub granularity: Granularity,
    pub min_samples: usize,
    /// Sorted by confidence descending, then key.
    pub rows: Vec<StateStats>,
}

impl StatsTable {
    pub fn get(&self, key: &str) -> Option<&StateStats> {
        self.rows.iter().find(|r| r.key == key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn top(&self, n: usize) -> &[StateStats] {
        &self.rows[..n.min(self.rows.len())]
    }
}

/// Summary statistics of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Describe {
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1); 0 for fewer than two values.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Percent of values strictly above zero.
    pub hit_rate: f64,
}

pub fn describe(values: &[f64]) -> Option<Describe> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = if values.len() < 2 {
        0.0
    } else {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    };
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    Some(Describe {
        mean,
        median,
        std,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        hit_rate: values.iter().filter(|v| **v > 0.0).count() as f64 / n * 100.0,
    })
}

/// Confidence score in [0, 100] from sample size, consistency, and hit-rate
/// distance from a coin flip.
pub fn confidence_score(n_samples: usize, mean_5d: f64, std_5d: f64, hit_rate_5d: f64) -> f64 {
    let sample = (n_samples as f64 * 0.4).min(40.0);
    let consistency = if std_5d > 0.0 && mean_5d.abs() > 0.01 {
        let cv = (std_5d / mean_5d).abs();
        (30.0 - (cv * 5.0).min(30.0)).max(0.0)
    } else {
        15.0
    };
    let hit = ((hit_rate_5d - 50.0).abs() * 0.6).min(30.0);
    (sample + consistency + hit).clamp(0.0, 100.0)
}

struct EdgeFacts {
    hit: f64,
    mean: f64,
    rr: f64,
}

const EDGE_RULES: &[Rule<EdgeFacts, EdgeClass>] = &[
    Rule {
        when: |f| f.hit >= 60.0 && f.mean > 0.5,
        then: EdgeClass::StrongBullish,
        note: "high hit rate, strong mean",
    },
    Rule {
        when: |f| f.hit >= 55.0 && f.mean > 0.2,
        then: EdgeClass::Bullish,
        note: "positive hit rate and mean",
    },
    Rule {
        when: |f| f.hit <= 40.0 && f.mean < -0.5,
        then: EdgeClass::StrongBearish,
        note: "low hit rate, strong negative mean",
    },
    Rule {
        when: |f| f.hit <= 45.0 && f.mean < -0.2,
        then: EdgeClass::Bearish,
        note: "negative hit rate and mean",
    },
    Rule {
        when: |f| f.rr > 1.5 && f.mean > 0.0,
        then: EdgeClass::AsymmetricBullish,
        note: "favorable excursion dominates",
    },
    Rule {
        when: |f| f.rr > 1.5 && f.mean < 0.0,
        then: EdgeClass::AsymmetricBearish,
        note: "favorable excursion dominates, negative drift",
    },
];

pub fn edge_class(hit_rate_5d: f64, mean_5d: f64, risk_reward_5d: f64) -> EdgeClass {
    let facts = EdgeFacts {
        hit: hit_rate_5d,
        mean: mean_5d,
        rr: risk_reward_5d,
    };
    first_match(EDGE_RULES, &facts).map_or(EdgeClass::Neutral, |r| r.then)
}

pub fn aggregate(instrument: &str, records: &[ObservationRecord], cfg: &AggregateConfig) -> StatsTable {
    let mut groups: BTreeMap<&str, Vec<&ObservationRecord>> = BTreeMap::new();
    for r in records
        .iter()
        .filter(|r| r.valid && !(cfg.exclude_defaults && r.used_defaults))
    {
        groups.entry(r.key(cfg.granularity)).or_default().push(r);
    }

    let mut rows: Vec<StateStats> = groups
        .into_iter()
        .filter(|(_, g)| g.len() >= cfg.min_samples.max(1))
        .filter_map(|(key, g)| summarize_group(key, &g))
        .collect();
    rows.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.key.cmp(&b.key))
    });

    StatsTable {
        instrument: instrument.to_string(),
        key_version: KEY_SCHEME_VERSION,
        granularity: cfg.granularity,
        min_samples: cfg.min_samples,
        rows,
    }
}

fn summarize_group(key: &str, group: &[&ObservationRecord]) -> Option<StateStats> {
    let column = |f: fn(&ObservationRecord) -> Option<f64>| -> Vec<f64> {
        group.iter().filter_map(|r| f(r)).collect()
    };
    let r5 = describe(&column(|r| r.return_5d))?;
    let r10 = describe(&column(|r| r.return_10d))?;
    let r20 = describe(&column(|r| r.return_20d))?;
    let mae5 = describe(&column(|r| r.mae_5d))?;
    let mfe5 = describe(&column(|r| r.mfe_5d))?;
    let mae20 = describe(&column(|r| r.mae_20d))?;
    let mfe20 = describe(&column(|r| r.mfe_20d))?;

    let n_samples = group.len();
    let risk_reward_5d = if mae5.mean != 0.0 {
        (mfe5.mean / mae5.mean).abs()
    } else {
        0.0
    };
    let expectancy_5d =
        r5.hit_rate / 100.0 * mfe5.mean + (100.0 - r5.hit_rate) / 100.0 * mae5.mean;

    Some(StateStats {
        key: key.to_string(),
        n_samples,
        mean_5d: r5.mean,
        median_5d: r5.median,
        std_5d: r5.std,
        min_5d: r5.min,
        max_5d: r5.max,
        hit_rate_5d: r5.hit_rate,
        mean_10d: r10.mean,
        median_10d: r10.median,
        std_10d: r10.std,
        min_10d: r10.min,
        max_10d: r10.max,
        hit_rate_10d: r10.hit_rate,
        mean_20d: r20.mean,
        median_20d: r20.median,
        std_20d: r20.std,
        min_20d: r20.min,
        max_20d: r20.max,
        hit_rate_20d: r20.hit_rate,
        avg_mae_5d: mae5.mean,
        median_mae_5d: mae5.median,
        worst_mae_5d: mae5.min,
        avg_mfe_5d: mfe5.mean,
        median_mfe_5d: mfe5.median,
        best_mfe_5d: mfe5.max,
        avg_mae_20d: mae20.mean,
        avg_mfe_20d: mfe20.mean,
        confidence: confidence_score(n_samples, r5.mean, r5.std, r5.hit_rate),
        risk_reward_5d,
        expectancy_5d,
        edge_class: edge_class(r5.hit_rate, r5.mean, risk_reward_5d),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Momentum, Participation, Positioning, Regime, Tailwind};
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use chrono::NaiveDate;

    fn record(day: i64, key_3: &str, ret: f64, valid: bool, used_defaults: bool) -> ObservationRecord {
        ObservationRecord {
            instrument: "GLD".into(),
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(day),
            close: 100.0,
            regime: Regime::Uptrend,
            momentum: Momentum::Steady,
            participation: Participation::Neutral,
            tailwind: Tailwind::Neutral,
            positioning: Positioning::Unknown,
            key_version: KEY_SCHEME_VERSION,
            key_3: key_3.into(),
            key_5: format!("{key_3}_Tn_Cu"),
            return_5d: Some(ret),
            return_10d: Some(ret * 2.0),
            return_20d: Some(ret * 3.0),
            mae_5d: Some(-1.0),
            mfe_5d: Some(2.0),
            mae_20d: Some(-2.0),
            mfe_20d: Some(4.0),
            valid,
            used_defaults,
        }
    }

    #[test]
    fn confidence_arithmetic() {
        // sample 20 + consistency 20 + hit 7.2
        assert_approx(confidence_score(50, 1.0, 2.0, 62.0), 47.2, 1e-9);
    }

    #[test]
    fn confidence_edge_cases() {
        assert_approx(confidence_score(10, 0.0, 0.0, 50.0), 19.0, 1e-9);
        assert_approx(confidence_score(1000, 5.0, 0.1, 100.0), 99.9, 1e-9);
        assert!(confidence_score(100_000, 5.0, 0.0, 100.0) <= 100.0);
    }

    #[test]
    fn describe_uses_sample_std() {
        let d = describe(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_approx(d.mean, 2.5, DEFAULT_EPSILON);
        assert_approx(d.median, 2.5, DEFAULT_EPSILON);
        assert_approx(d.std, (5.0f64 / 3.0).sqrt(), 1e-12);
        assert_approx(d.hit_rate, 100.0, DEFAULT_EPSILON);
        assert_eq!(describe(&[-1.0]).unwrap().std, 0.0);
        assert!(describe(&[]).is_none());
    }

    #[test]
    fn edge_table_order() {
        assert_eq!(edge_class(65.0, 1.0, 0.5), EdgeClass::StrongBullish);
        assert_eq!(edge_class(56.0, 0.3, 0.5), EdgeClass::Bullish);
        assert_eq!(edge_class(35.0, -1.0, 0.5), EdgeClass::StrongBearish);
        assert_eq!(edge_class(44.0, -0.3, 0.5), EdgeClass::Bearish);
        assert_eq!(edge_class(50.0, 0.1, 2.0), EdgeClass::AsymmetricBullish);
        assert_eq!(edge_class(50.0, -0.1, 2.0), EdgeClass::AsymmetricBearish);
        assert_eq!(edge_class(50.0, 0.1, 1.0), EdgeClass::Neutral);
    }

    #[test]
    fn small_groups_are_dropped() {
        let mut records: Vec<_> = (0..12).map(|i| record(i, "Ru_Ms_Pn", 1.0, true, true)).collect();
        records.extend((12..21).map(|i| record(i, "Rd_Mc_Pt", -1.0, true, true)));
        let table = aggregate("GLD", &records, &AggregateConfig::default());
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].key, "Ru_Ms_Pn");
        assert_eq!(table.rows[0].n_samples, 12);
        assert!(table.get("Rd_Mc_Pt").is_none());
    }

    #[test]
    fn invalid_and_default_rows() {
        let mut records: Vec<_> = (0..10).map(|i| record(i, "Ru_Ms_Pn", 1.0, true, true)).collect();
        records.push(record(10, "Ru_Ms_Pn", 1.0, false, false));
        let table = aggregate("GLD", &records, &AggregateConfig::default());
        assert_eq!(table.rows[0].n_samples, 10);

        let cfg = AggregateConfig {
            exclude_defaults: true,
            ..AggregateConfig::default()
        };
        assert!(aggregate("GLD", &records, &cfg).is_empty());
    }

    #[test]
    fn risk_metrics_and_edge() {
        let records: Vec<_> = (0..10).map(|i| record(i, "Ru_Ms_Pn", 1.0, true, false)).collect();
        let row = &aggregate("GLD", &records, &AggregateConfig::default()).rows[0];
        assert_approx(row.risk_reward_5d, 2.0, DEFAULT_EPSILON);
        // 100% hits: expectancy is the average favorable excursion
        assert_approx(row.expectancy_5d, 2.0, DEFAULT_EPSILON);
        assert_eq!(row.edge_class, EdgeClass::StrongBullish);
        assert_eq!(row.worst_mae_5d, -1.0);
        assert_eq!(row.std_5d, 0.0);
        assert_approx(row.confidence, 4.0 + 15.0 + 30.0, 1e-9);
    }

    #[test]
    fn five_pillar_grouping_and_sort_order() {
        let mut records: Vec<_> = (0..40).map(|i| record(i, "Ru_Ms_Pn", 1.0, true, false)).collect();
        records.extend((40..60).map(|i| record(i, "Rr_Ms_Pn", 0.0, true, false)));
        let table = aggregate(
            "GLD",
            &records,
            &AggregateConfig {
                granularity: Granularity::FivePillar,
                ..AggregateConfig::default()
            },
        );
        assert_eq!(table.granularity, Granularity::FivePillar);
        assert_eq!(table.rows[0].key, "Ru_Ms_Pn_Tn_Cu");
        assert!(table.rows[0].confidence >= table.rows[1].confidence);
    }
}
