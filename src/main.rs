//! Metrics extraction CLI for network-privacy simulator logs.
//!
//! Parses logs into per-file series files and summary reports, and
//! summarizes series files written by earlier runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Context, Result};
use env_logger::Env;
use log::info;

use simlog_metrics::analysis::{self, AnalysisReport, LogVariant};
use simlog_metrics::config_loader::{self, CliOverrides};

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "simlog-metrics")]
#[command(about = "Goodput, utilization and latency metrics from simulator logs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse simulator logs and write one series file per log
    Parse {
        /// Log layout
        #[arg(long, value_enum)]
        variant: Option<LogVariant>,

        /// Ignore records stamped before this simulated time (e.g. 10m)
        #[arg(long, value_parser = parse_duration)]
        warmup: Option<Duration>,

        /// Stop reading a log after this simulated time (e.g. 30m)
        #[arg(long, value_parser = parse_duration)]
        cutoff: Option<Duration>,

        /// Directory for series files (default: next to each log)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Directory for JSON and text reports
        #[arg(short, long)]
        report_dir: Option<PathBuf>,

        /// Do not write series files
        #[arg(long)]
        no_series: bool,

        /// Log files, plain or gzip-compressed
        #[arg(required = true)]
        logs: Vec<PathBuf>,
    },

    /// Summarize series files from earlier runs
    Summary {
        /// Directory for JSON and text reports
        #[arg(short, long)]
        report_dir: Option<PathBuf>,

        /// Series files
        #[arg(required = true)]
        dats: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    match cli.command {
        Commands::Parse {
            variant,
            warmup,
            cutoff,
            output_dir,
            report_dir,
            no_series,
            logs,
        } => {
            let mut config = config_loader::load_or_default(cli.config.as_deref())?;
            let overrides = CliOverrides {
                variant,
                warmup,
                cutoff,
                threads: cli.threads,
                output_dir,
                report_dir,
                no_series,
            };
            config_loader::apply_overrides(&mut config, &overrides)?;
            configure_threads(config.threads)?;

            if let Some(dir) = &config.output_dir {
                fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create output directory: {}", dir.display())
                })?;
            }

            let options = config.parse_options()?;
            info!(
                "Parsing {} logs (variant {}, warmup {} ns, cutoff {:?})",
                logs.len(),
                options.variant,
                options.warmup_nanos,
                options.cutoff_nanos
            );

            let outcomes = analysis::process_all_logs(
                &logs,
                &options,
                config.output_dir.as_deref(),
                config.write_series,
            );
            let report = AnalysisReport::from_outcomes(&outcomes, options.variant);

            analysis::print_summary(&report);
            if let Some(dir) = &config.report_dir {
                write_reports(&report, dir)?;
            }

            if !report.failures.is_empty() {
                bail!(
                    "{} of {} logs failed",
                    report.failures.len(),
                    report.metadata.total_files
                );
            }
        }
        Commands::Summary { report_dir, dats } => {
            let config = config_loader::load_or_default(cli.config.as_deref())?;
            configure_threads(cli.threads.unwrap_or(config.threads))?;

            let metrics = analysis::read_series_files(&dats)?;
            info!("Read {} series files", metrics.len());

            let report = AnalysisReport::from_metrics(&metrics);
            analysis::print_summary(&report);
            if let Some(dir) = report_dir.as_ref().or(config.report_dir.as_ref()) {
                write_reports(&report, dir)?;
            }
        }
    }

    Ok(())
}

fn configure_threads(threads: usize) -> Result<()> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }
    Ok(())
}

fn write_reports(report: &AnalysisReport, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory: {}", dir.display()))?;
    analysis::generate_json_report(report, &dir.join("metrics_report.json"))?;
    analysis::generate_text_report(report, &dir.join("metrics_report.txt"))?;
    Ok(())
}
