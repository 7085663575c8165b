//! Quote Refinery - reference-currency equivalence builder
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Pairs   │───▶│ Classify │───▶│  Direct  │───▶│  Route   │───▶│  Unify   │
//! │ Tickers  │    │ (D/I/X)  │    │ (1 / p)  │    │ (1 hop)  │    │ (dedup)  │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use quote_refinery::config::AppConfig;
use quote_refinery::csv_io::{self, OutputPaths};
use quote_refinery::pipeline::{RefineryRun, run_refinery, write_outputs};
use quote_refinery::{classify, unify};

#[derive(Debug, Parser)]
#[command(
    name = "quote_refinery",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"),
    about = "Express every listed asset in units of one reference currency"
)]
struct Cli {
    /// Config environment, loads config/<env>.yaml
    #[arg(short, long, global = true, default_value = "dev")]
    env: String,

    /// Explicit config file, overrides --env
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reference currency code, overrides the config file
    #[arg(long, global = true)]
    reference: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Full pipeline: classify, direct, route, unify, write all outputs
    Run(RunArgs),

    /// Only write the direct / inverted / indirect bucket files
    Classify(ClassifyArgs),

    /// Merge a direct and a derived equivalence table from earlier runs
    Unify(UnifyArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long)]
    pairs: Option<PathBuf>,
    #[arg(long)]
    tickers: Option<PathBuf>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ClassifyArgs {
    #[arg(long)]
    pairs: Option<PathBuf>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct UnifyArgs {
    #[arg(long)]
    direct: PathBuf,
    #[arg(long)]
    derived: PathBuf,
    #[arg(long)]
    out: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(&cli.env)?,
    };
    if let Some(reference) = &cli.reference {
        config.refinery.reference_currency = reference.trim().to_uppercase();
        config.refinery.validate()?;
    }
    Ok(config)
}

fn print_run_summary(run: &RefineryRun, threshold: f64) {
    let counts = run.counts();
    println!("=== Quote Refinery: {} ===", run.reference_currency);
    println!(
        "Pairs: {} (direct {}, inverted {}, indirect {})",
        counts.pairs, counts.direct_pairs, counts.inverted_pairs, counts.indirect_pairs
    );
    println!(
        "Direct equivalences: {} (skipped {}, superseded {})",
        counts.direct_entries, counts.skipped_direct, counts.superseded_direct
    );
    println!(
        "Derived equivalences: {} (unrouted {})",
        counts.derived_entries, counts.unrouted_indirect
    );
    println!("Coverage: {}", run.routing.report);
    let unified = run.table.summary();
    println!(
        "Equivalence table: {} rows ({} direct, {} derived, {} duplicates resolved)",
        unified.total(),
        unified.direct_rows,
        unified.derived_rows,
        unified.duplicates_resolved
    );
    if run.low_coverage {
        println!(
            "WARNING: indirect coverage {:.2}% is below {:.2}%",
            run.routing.report.ratio_percent, threshold
        );
    }
}

fn cmd_run(config: &AppConfig, args: &RunArgs) -> anyhow::Result<()> {
    let pairs_path = args
        .pairs
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.paths.pairs));
    let tickers_path = args
        .tickers
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.paths.tickers));
    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.paths.output_dir));

    let start = Instant::now();
    let pairs = csv_io::load_pairs(&pairs_path)?;
    let snapshot = csv_io::load_snapshot(&tickers_path)?;

    let refinery = &config.refinery;
    let run = run_refinery(&pairs, &snapshot, refinery).context("Refinery run aborted")?;
    let paths = OutputPaths::new(out_dir, &refinery.reference_currency);
    write_outputs(&run, &paths, refinery)?;

    print_run_summary(&run, refinery.coverage_warn_percent);
    println!("Outputs: {}/ ({:.2?})", paths.dir().display(), start.elapsed());
    Ok(())
}

fn cmd_classify(config: &AppConfig, args: &ClassifyArgs) -> anyhow::Result<()> {
    let pairs_path = args
        .pairs
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.paths.pairs));
    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.paths.output_dir));

    let pairs = csv_io::load_pairs(&pairs_path)?;
    if pairs.is_empty() {
        tracing::warn!("Pair table {} is empty", pairs_path.display());
    }
    let reference = &config.refinery.reference_currency;
    let set = classify(&pairs, reference)?;

    let paths = OutputPaths::new(out_dir, reference);
    paths.ensure_dir()?;
    csv_io::write_classified(&paths, &set)?;

    println!(
        "Classified {} pairs against {}: direct {}, inverted {}, indirect {}",
        set.len(),
        reference,
        set.direct.len(),
        set.inverted.len(),
        set.indirect.len()
    );
    Ok(())
}

fn cmd_unify(config: &AppConfig, args: &UnifyArgs) -> anyhow::Result<()> {
    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.paths.output_dir));
    let refinery = &config.refinery;

    let direct = csv_io::load_equivalences(&args.direct)?;
    let derived = csv_io::load_equivalences(&args.derived)?;
    let table = unify(&direct, &derived, refinery.dedup_key);

    let paths = OutputPaths::new(out_dir, &refinery.reference_currency);
    paths.ensure_dir()?;
    csv_io::write_equivalences(paths.equivalence_table(), table.entries(), &refinery.precision)?;

    let summary = table.summary();
    println!(
        "Unified {} rows ({} direct, {} derived, {} duplicates resolved) -> {}",
        summary.total(),
        summary.direct_rows,
        summary.derived_rows,
        summary.duplicates_resolved,
        paths.equivalence_table().display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(2);
        }
    };
    let _log_guard = quote_refinery::logging::init_logging(&config);

    tracing::info!(
        env = %cli.env,
        reference = %config.refinery.reference_currency,
        "Starting quote_refinery {}",
        env!("GIT_HASH")
    );

    let result = match &cli.command {
        Command::Run(args) => cmd_run(&config, args),
        Command::Classify(args) => cmd_classify(&config, args),
        Command::Unify(args) => cmd_unify(&config, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
