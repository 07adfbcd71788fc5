//! StateLab CLI: historical walks, aggregation, and live expectations.
//!
//! Commands:
//! - `walk`: walk one instrument's history and write its observations
//! - `aggregate`: rebuild a stats table from stored observations
//! - `run`: walk and aggregate every configured instrument
//! - `expect`: classify the latest bar and look up its forward statistics
//! - `states`: list the top states of a stored stats table

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use statelab_core::context::{ExogenousContext, MacroContext};
use statelab_core::encode::{Granularity, StateKey};
use statelab_core::expectation::{format_expectations_text, state_readable};
use statelab_core::walk::summarize;
use statelab_runner::report::{top_states_report, universe_report, walk_summary_report, write_report};
use statelab_runner::{
    aggregate_stored, expect_live, load_history, run_universe, walk_parallel, CsvHistoryProvider,
    DatasetStore, PipelineConfig, StatsRegistry,
};

#[derive(Parser)]
#[command(
    name = "statelab",
    version,
    about = "StateLab CLI - state-conditioned forward return analytics"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Config file plus directory overrides shared by every command.
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Path to a TOML pipeline config. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of `<instrument>.csv` histories (overrides config).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for observation and stats datasets (overrides config).
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk one instrument's history and write its observations.
    Walk {
        #[command(flatten)]
        common: CommonArgs,

        /// Instrument to walk (file stem of its CSV history).
        #[arg(long)]
        instrument: String,

        /// First date to walk (YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date to walk (YYYY-MM-DD).
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Walk every Nth bar.
        #[arg(long)]
        step: Option<usize>,

        /// Walk dates sequentially instead of on the thread pool.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Rebuild a stats table from stored observations.
    Aggregate {
        #[command(flatten)]
        common: CommonArgs,

        #[arg(long)]
        instrument: String,

        /// Minimum observations for a state to be kept.
        #[arg(long)]
        min_samples: Option<usize>,

        /// Key granularity: three_pillar or five_pillar.
        #[arg(long)]
        granularity: Option<String>,

        /// Drop observations whose exogenous inputs were placeholders.
        #[arg(long, default_value_t = false)]
        exclude_defaults: bool,

        /// Number of states to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Walk and aggregate every configured instrument.
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Also write a markdown report of the top states here.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Number of states per instrument in the report.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Classify the latest bar and look up its forward statistics.
    Expect {
        #[command(flatten)]
        common: CommonArgs,

        #[arg(long)]
        instrument: String,

        /// Currency proxy 5-day change, percent.
        #[arg(long, allow_hyphen_values = true)]
        currency_5d: Option<f64>,

        /// Currency proxy 20-day change, percent.
        #[arg(long, allow_hyphen_values = true)]
        currency_20d: Option<f64>,

        /// Real-yield proxy 5-day change, percent.
        #[arg(long, allow_hyphen_values = true)]
        real_yield_5d: Option<f64>,

        /// Real-yield proxy 20-day change, percent.
        #[arg(long, allow_hyphen_values = true)]
        real_yield_20d: Option<f64>,

        /// Positioning percentile, 0 to 100.
        #[arg(long)]
        positioning: Option<f64>,

        /// Print the full response as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List the top states of a stored stats table.
    States {
        #[command(flatten)]
        common: CommonArgs,

        #[arg(long)]
        instrument: String,

        #[arg(long, default_value_t = 20)]
        top: usize,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Walk {
            common,
            instrument,
            start,
            end,
            step,
            sequential,
        } => {
            let mut config = load_config(&common)?;
            if start.is_some() {
                config.walk.start = start;
            }
            if end.is_some() {
                config.walk.end = end;
            }
            if let Some(step) = step {
                config.walk.step = step;
            }
            if sequential {
                config.data.parallel = false;
            }
            config.validate()?;
            run_walk(&config, &instrument)
        }
        Commands::Aggregate {
            common,
            instrument,
            min_samples,
            granularity,
            exclude_defaults,
            top,
        } => {
            let mut config = load_config(&common)?;
            if let Some(n) = min_samples {
                config.aggregate.min_samples = n;
            }
            if let Some(label) = granularity {
                config.aggregate.granularity = Granularity::from_label(&label).with_context(|| {
                    format!("unknown granularity '{label}' (use three_pillar or five_pillar)")
                })?;
            }
            if exclude_defaults {
                config.aggregate.exclude_defaults = true;
            }
            config.validate()?;
            run_aggregate(&config, &instrument, top)
        }
        Commands::Run {
            common,
            report,
            top,
        } => run_all(&load_config(&common)?, report, top),
        Commands::Expect {
            common,
            instrument,
            currency_5d,
            currency_20d,
            real_yield_5d,
            real_yield_20d,
            positioning,
            json,
        } => {
            let config = load_config(&common)?;
            let macro_context = match (currency_5d, currency_20d, real_yield_5d, real_yield_20d) {
                (Some(c5), Some(c20), Some(r5), Some(r20)) => Some(MacroContext {
                    currency_change_5d: c5,
                    currency_change_20d: c20,
                    real_yield_change_5d: r5,
                    real_yield_change_20d: r20,
                }),
                (None, None, None, None) => None,
                _ => bail!(
                    "macro inputs go together: pass all of --currency-5d, --currency-20d, --real-yield-5d, --real-yield-20d"
                ),
            };
            if let Some(p) = positioning {
                if !(0.0..=100.0).contains(&p) {
                    bail!("--positioning must be between 0 and 100 (got {p})");
                }
            }
            let context = ExogenousContext::live(macro_context, positioning);
            run_expect(&config, &instrument, &context, json)
        }
        Commands::States {
            common,
            instrument,
            top,
        } => {
            let config = load_config(&common)?;
            let store = DatasetStore::new(&config.data.output_dir);
            let table = store
                .load_stats(&instrument)?
                .with_context(|| format!("no stats for {instrument}; run `statelab run` or `statelab aggregate` first"))?;
            println!("{}", top_states_report(&table, top));
            Ok(())
        }
    }
}

/// INFO-level `tracing` subscriber; `RUST_LOG` overrides.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init()
}

fn load_config(common: &CommonArgs) -> Result<PipelineConfig> {
    let mut config = match &common.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &common.data_dir {
        config.data.data_dir = dir.clone();
    }
    if let Some(dir) = &common.output_dir {
        config.data.output_dir = dir.clone();
    }
    Ok(config)
}

fn run_walk(config: &PipelineConfig, instrument: &str) -> Result<()> {
    let provider = CsvHistoryProvider::new(&config.data.data_dir);
    let store = DatasetStore::new(&config.data.output_dir);

    let loaded = load_history(&provider, instrument)?;
    let report = walk_parallel(
        instrument,
        &loaded.bars,
        &config.walk_config(),
        &ExogenousContext::historical_default(),
        config.data.parallel,
    )
    .with_context(|| format!("walk failed for {instrument}"))?;
    let path = store.write_observations(instrument, &report.records)?;

    println!("{}", walk_summary_report(instrument, &summarize(&report)));
    println!("Observations written to: {}", path.display());
    Ok(())
}

fn run_aggregate(config: &PipelineConfig, instrument: &str, top: usize) -> Result<()> {
    let store = DatasetStore::new(&config.data.output_dir);
    let table = aggregate_stored(config, &store, &StatsRegistry::new(), instrument)
        .with_context(|| format!("aggregation failed for {instrument}"))?;
    println!("{}", top_states_report(&table, top));
    println!("Stats written to: {}", store.stats_path(instrument).display());
    Ok(())
}

fn run_all(config: &PipelineConfig, report_path: Option<PathBuf>, top: usize) -> Result<()> {
    let provider = CsvHistoryProvider::new(&config.data.data_dir);
    let store = DatasetStore::new(&config.data.output_dir);
    let registry = StatsRegistry::new();

    let instruments = if config.instruments.is_empty() {
        provider.instruments()?
    } else {
        config.instruments.clone()
    };
    info!(count = instruments.len(), data_dir = %config.data.data_dir.display(), "resolved instruments");

    let outcomes = run_universe(config, &provider, &store, &registry, &instruments);
    println!("{}", universe_report(&outcomes));

    if let Some(path) = report_path {
        let mut markdown = String::from("# StateLab Run Report\n\n");
        for outcome in &outcomes {
            if let Ok(run) = &outcome.result {
                markdown.push_str(&top_states_report(&run.table, top));
                markdown.push('\n');
            }
        }
        write_report(&path, &markdown)?;
        println!("Report written to: {}", path.display());
    }

    if !outcomes.is_empty() && outcomes.iter().all(|o| o.result.is_err()) {
        bail!("every instrument failed");
    }
    Ok(())
}

fn run_expect(
    config: &PipelineConfig,
    instrument: &str,
    context: &ExogenousContext,
    json: bool,
) -> Result<()> {
    let provider = CsvHistoryProvider::new(&config.data.data_dir);
    let store = DatasetStore::new(&config.data.output_dir);
    let registry = StatsRegistry::new();

    let live = expect_live(config, &provider, &store, &registry, instrument, context)
        .with_context(|| format!("live lookup failed for {instrument}"))?;

    if json {
        let out = serde_json::json!({
            "classified": live.classified,
            "response": live.response,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let assessment = &live.classified.assessment;
    let state = &live.classified.state;
    println!(
        "{instrument}: {} [{}]",
        state_readable(state),
        StateKey::from_state(state, Granularity::FivePillar)
    );
    println!(
        "Assessment: {:?} (+{} / -{}) - {}",
        assessment.bias, assessment.bullish_signals, assessment.bearish_signals, assessment.action
    );
    if live.classified.used_defaults {
        println!("Note: macro inputs were assumed neutral");
    }
    println!();
    println!("{}", format_expectations_text(&live.response));
    Ok(())
}
