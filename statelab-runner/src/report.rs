//! Plain-text and markdown reports.

use std::path::Path;

use anyhow::{Context, Result};

use statelab_core::aggregate::StatsTable;
use statelab_core::domain::MarketState;
use statelab_core::encode::StateKey;
use statelab_core::expectation::state_readable;
use statelab_core::walk::WalkSummary;

use crate::pipeline::InstrumentOutcome;

/// Markdown table of the `n` highest-confidence states.
pub fn top_states_report(table: &StatsTable, n: usize) -> String {
    let mut report = format!(
        "## {} - top states ({} of {}, {} keys, min {} samples)\n\n",
        table.instrument,
        n.min(table.len()),
        table.len(),
        table.granularity.label(),
        table.min_samples
    );
    if table.is_empty() {
        report.push_str("No state met the minimum sample count.\n");
        return report;
    }

    report.push_str("| Key | State | N | Mean 5d | Hit 5d | Mean 20d | R:R | Conf | Edge |\n");
    report.push_str("|-----|-------|---|---------|--------|----------|-----|------|------|\n");
    for row in table.top(n) {
        let readable = row
            .state_key()
            .map(|k| readable_key(&k))
            .unwrap_or_else(|| "-".to_string());
        report.push_str(&format!(
            "| {} | {} | {} | {:+.2}% | {:.0}% | {:+.2}% | {:.2} | {:.0} | {} |\n",
            row.key,
            readable,
            row.n_samples,
            row.mean_5d,
            row.hit_rate_5d,
            row.mean_20d,
            row.risk_reward_5d,
            row.confidence,
            row.edge_class.label()
        ));
    }
    report
}

fn readable_key(key: &StateKey) -> String {
    let (regime, momentum, participation) = match *key {
        StateKey::ThreePillar(k) => (k.regime, k.momentum, k.participation),
        StateKey::FivePillar(k) => (k.regime, k.momentum, k.participation),
    };
    let mut state = MarketState::unknown();
    state.regime = regime;
    state.momentum = momentum;
    state.participation = participation;
    state_readable(&state)
}

/// Walk totals and the state distribution, most frequent first.
pub fn walk_summary_report(instrument: &str, summary: &WalkSummary) -> String {
    let pct = |v: Option<f64>| v.map_or("n/a".to_string(), |v| format!("{v:+.2}%"));
    let mut lines = vec![
        format!("Walk summary: {instrument}"),
        format!(
            "  Observations: {} ({} valid, {} skipped, {} with default inputs)",
            summary.total, summary.valid, summary.skipped, summary.used_defaults
        ),
        format!("  Unique states: {}", summary.unique_states),
        format!(
            "  Mean forward return: 5d {} / 10d {} / 20d {}",
            pct(summary.mean_return_5d),
            pct(summary.mean_return_10d),
            pct(summary.mean_return_20d)
        ),
    ];
    if let Some(hit) = summary.hit_rate_5d {
        lines.push(format!("  5d hit rate: {hit:.1}%"));
    }

    let mut dist: Vec<(&String, &usize)> = summary.distribution.iter().collect();
    dist.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    if !dist.is_empty() {
        lines.push("  State distribution:".to_string());
        for (key, count) in dist {
            let share = *count as f64 / summary.total.max(1) as f64 * 100.0;
            lines.push(format!("    {key:<10} {count:>6}  ({share:.1}%)"));
        }
    }
    lines.join("\n")
}

/// One line per instrument of a universe run.
pub fn universe_report(outcomes: &[InstrumentOutcome]) -> String {
    let mut lines = vec![format!("Universe run: {} instruments", outcomes.len())];
    for outcome in outcomes {
        match &outcome.result {
            Ok(run) => lines.push(format!(
                "  OK    {:<10} {} observations, {} states, fingerprint {}",
                outcome.instrument,
                run.summary.total,
                run.table.len(),
                &run.fingerprint[..12]
            )),
            Err(e) => lines.push(format!("  FAIL  {:<10} {e}", outcome.instrument)),
        }
    }
    lines.join("\n")
}

/// Write a report to disk, creating parent directories.
pub fn write_report(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    Ok(())
}
