//! Log parsing for simulator output.
//!
//! Streams plain or gzip-compressed logs line by line through the classifier,
//! extractor and aggregator, and processes independent files in parallel.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use flate2::read::GzDecoder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::aggregator::ParseState;
use super::classifier;
use super::dat_file;
use super::error::ParseError;
use super::extractor;
use super::types::*;

/// Per-pass knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseOptions {
    pub variant: LogVariant,
    /// Records stamped before this are skipped
    pub warmup_nanos: SimNanos,
    /// The scan stops at the first record stamped after this
    pub cutoff_nanos: Option<SimNanos>,
}

/// Counters describing one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    pub lines: usize,
    pub records: usize,
    pub skipped_records: usize,
    pub skipped_warmup: usize,
    pub stopped_at_cutoff: bool,
}

/// Result of parsing one log
#[derive(Debug, Clone)]
pub struct ParsedLog {
    pub path: PathBuf,
    /// Series file written for this log, if any
    pub dat_path: Option<PathBuf>,
    pub metrics: FileMetrics,
    pub stats: ParseStats,
}

/// Outcome of one parallel task
#[derive(Debug)]
pub struct LogOutcome {
    pub path: PathBuf,
    pub result: Result<ParsedLog>,
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Open a log, decompressing when the name ends in `.gz`
pub fn open_log(path: &Path) -> Result<Box<dyn BufRead>, ParseError> {
    let file = File::open(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if is_gzip(path) {
        Ok(Box::new(BufReader::with_capacity(64 * 1024, GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::with_capacity(64 * 1024, file)))
    }
}

/// Feed every line of `reader` into `state`.
///
/// Lines must arrive in log order. Bytes that are not UTF-8 are replaced
/// rather than rejected. A malformed timestamp or a field the classifier
/// promised but the line lacks aborts the pass.
pub fn parse_lines<R: BufRead>(
    mut reader: R,
    path: &Path,
    options: &ParseOptions,
    state: &mut ParseState,
) -> Result<ParseStats, ParseError> {
    let mut stats = ParseStats::default();
    let mut buf = Vec::with_capacity(1024);

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if read == 0 {
            break;
        }
        stats.lines += 1;
        let line_number = stats.lines;
        let line = String::from_utf8_lossy(&buf);

        let Some(record) = classifier::read_record(&line, line_number, options.variant)? else {
            continue;
        };

        if options.cutoff_nanos.is_some_and(|cutoff| record.timestamp_nanos > cutoff) {
            log::debug!(
                "{}: cutoff reached at line {} (t={})",
                path.display(),
                line_number,
                record.timestamp_nanos
            );
            stats.stopped_at_cutoff = true;
            break;
        }
        if record.timestamp_nanos < options.warmup_nanos {
            stats.skipped_warmup += 1;
            continue;
        }

        let fields = match extractor::extract(&record, options.variant) {
            Ok(Some(fields)) => fields,
            Ok(None) => continue,
            Err(e) if e.is_skippable() => {
                log::warn!("{}:{}: skipping record: {}", path.display(), line_number, e);
                stats.skipped_records += 1;
                continue;
            }
            Err(source) => {
                return Err(ParseError::FieldExtraction {
                    line: line_number,
                    source,
                })
            }
        };
        state.observe(fields).map_err(|source| ParseError::FieldExtraction {
            line: line_number,
            source,
        })?;
        stats.records += 1;
    }

    Ok(stats)
}

/// Parse a single log file with a fresh state
pub fn parse_log_file(path: &Path, options: &ParseOptions) -> Result<ParsedLog, ParseError> {
    log::info!("Reading {} ...", path.display());
    let reader = open_log(path)?;

    let mut state = ParseState::new();
    let stats = parse_lines(reader, path, options, &mut state)?;

    log::debug!(
        "Parsed {}: {} records, {} file sharers, {} web browsers, {} heartbeats",
        path.display(),
        state.records(),
        state.file_sharer_count(),
        state.web_browser_count(),
        state.heartbeats().len()
    );

    Ok(ParsedLog {
        path: path.to_path_buf(),
        dat_path: None,
        metrics: FileMetrics::from_state(&path.display().to_string(), &state),
        stats,
    })
}

/// Parse one log and, when `output_dir` is given, write its series file
pub fn process_log_file(
    path: &Path,
    options: &ParseOptions,
    output_dir: Option<&Path>,
    write_series: bool,
) -> Result<ParsedLog> {
    let mut parsed = parse_log_file(path, options)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if write_series {
        let dat_path = dat_file::dat_path_for(path, output_dir);
        dat_file::write_series_file(&dat_path, &parsed.metrics)?;
        parsed.dat_path = Some(dat_path);
    }

    Ok(parsed)
}

/// Process every log as an independent task.
///
/// A failing log is reported in its outcome and does not affect the others.
/// Outcomes are returned in input order.
pub fn process_all_logs(
    paths: &[PathBuf],
    options: &ParseOptions,
    output_dir: Option<&Path>,
    write_series: bool,
) -> Vec<LogOutcome> {
    log::info!("Parsing {} logs in parallel...", paths.len());

    let outcomes: Vec<LogOutcome> = paths
        .par_iter()
        .map(|path| {
            let result = process_log_file(path, options, output_dir, write_series);
            if let Err(e) = &result {
                log::warn!("Failed to process {}: {:#}", path.display(), e);
            }
            LogOutcome {
                path: path.clone(),
                result,
            }
        })
        .collect();

    let ok = outcomes.iter().filter(|o| o.result.is_ok()).count();
    log::info!("Parsed {} of {} logs", ok, outcomes.len());

    outcomes
}
