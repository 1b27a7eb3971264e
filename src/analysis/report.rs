//! Report generation for parsed simulator logs.
//!
//! Generates both JSON and human-readable text reports.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use super::distribution::DistributionSeries;
use super::log_parser::{LogOutcome, ParseStats, ParsedLog};
use super::types::*;

/// Summary statistics of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub name: String,
    pub unit: String,
    pub count: usize,
    pub min: Option<f64>,
    pub median: Option<f64>,
    pub mean: Option<f64>,
    pub max: Option<f64>,
}

impl SeriesStats {
    pub fn new(key: SeriesKey, values: &[f64]) -> Self {
        let dist = DistributionSeries::new(values.to_vec());
        let sorted = dist.values();
        let count = sorted.len();

        let median = match count {
            0 => None,
            n if n % 2 == 0 => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
            n => Some(sorted[n / 2]),
        };
        let mean = (count > 0).then(|| sorted.iter().sum::<f64>() / count as f64);

        Self {
            name: key.name().to_string(),
            unit: key.unit().to_string(),
            count,
            min: sorted.first().copied(),
            median,
            mean,
            max: sorted.last().copied(),
        }
    }

    /// No qualifying values; plotting should omit the series
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Everything reported about one log or series file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub source: String,
    pub dat_path: Option<String>,
    pub parse_stats: Option<ParseStats>,
    pub traffic: TrafficTotals,
    pub series: Vec<SeriesStats>,
}

impl FileReport {
    pub fn from_metrics(metrics: &FileMetrics) -> Self {
        Self {
            source: metrics.source.clone(),
            dat_path: None,
            parse_stats: None,
            traffic: metrics.traffic.clone(),
            series: metrics
                .ordered()
                .map(|(key, values)| SeriesStats::new(key, values))
                .collect(),
        }
    }

    pub fn from_parsed(parsed: &ParsedLog) -> Self {
        Self {
            dat_path: parsed.dat_path.as_ref().map(|p| p.display().to_string()),
            parse_stats: Some(parsed.stats.clone()),
            ..Self::from_metrics(&parsed.metrics)
        }
    }

    pub fn series(&self, key: SeriesKey) -> Option<&SeriesStats> {
        self.series.iter().find(|s| s.name == key.name())
    }
}

/// A log that could not be processed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedFile {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub analysis_timestamp: String,
    pub variant: Option<LogVariant>,
    pub total_files: usize,
    pub processed_files: usize,
}

/// Report across every file of one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub files: Vec<FileReport>,
    pub failures: Vec<FailedFile>,
}

impl AnalysisReport {
    /// Build from parse outcomes, keeping failures alongside successes
    pub fn from_outcomes(outcomes: &[LogOutcome], variant: LogVariant) -> Self {
        let mut files = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match &outcome.result {
                Ok(parsed) => files.push(FileReport::from_parsed(parsed)),
                Err(e) => failures.push(FailedFile {
                    path: outcome.path.display().to_string(),
                    error: format!("{:#}", e),
                }),
            }
        }
        Self::new(Some(variant), files, failures)
    }

    /// Build from series files read back from disk
    pub fn from_metrics(metrics: &[FileMetrics]) -> Self {
        Self::new(None, metrics.iter().map(FileReport::from_metrics).collect(), Vec::new())
    }

    fn new(variant: Option<LogVariant>, files: Vec<FileReport>, failures: Vec<FailedFile>) -> Self {
        Self {
            metadata: ReportMetadata {
                analysis_timestamp: chrono::Utc::now().to_rfc3339(),
                variant,
                total_files: files.len() + failures.len(),
                processed_files: files.len(),
            },
            files,
            failures,
        }
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

/// Generate JSON report
pub fn generate_json_report(report: &AnalysisReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Render the human-readable report
pub fn render_text_report(report: &AnalysisReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push("=".repeat(80));
    lines.push("                     SIMULATION LOG METRICS".to_string());
    lines.push("=".repeat(80));
    lines.push(String::new());

    lines.push(format!("Analysis Date: {}", report.metadata.analysis_timestamp));
    if let Some(variant) = report.metadata.variant {
        lines.push(format!("Log Variant: {}", variant));
    }
    lines.push(format!(
        "Files: {} processed of {}",
        report.metadata.processed_files, report.metadata.total_files
    ));
    lines.push(String::new());

    for file in &report.files {
        lines.push("-".repeat(80));
        lines.push(file.source.clone());
        lines.push("-".repeat(80));
        if let Some(dat) = &file.dat_path {
            lines.push(format!("Series file: {}", dat));
        }
        if let Some(stats) = &file.parse_stats {
            lines.push(format!(
                "Lines: {}  Records: {}  Skipped: {}  Before warmup: {}{}",
                stats.lines,
                stats.records,
                stats.skipped_records,
                stats.skipped_warmup,
                if stats.stopped_at_cutoff { "  (stopped at cutoff)" } else { "" }
            ));
        }

        let traffic = &file.traffic;
        if traffic.web_entities + traffic.file_sharer_entities > 0 {
            lines.push(format!(
                "Entities: {} web browsers, {} file sharers",
                traffic.web_entities, traffic.file_sharer_entities
            ));
            lines.push(format!(
                "Bytes: {} web, {} file sharing{}",
                traffic.web_bytes,
                traffic.file_sharer_bytes,
                traffic
                    .file_sharer_byte_share()
                    .map(|s| format!(" ({:.1}% file sharing)", s * 100.0))
                    .unwrap_or_default()
            ));
        }
        if let Some(share) = traffic.file_sharer_connection_share() {
            lines.push(format!("Connections: {:.1}% file sharing", share * 100.0));
        }
        lines.push(String::new());

        lines.push(format!(
            "  {:<34} {:>7} {:>12} {:>12} {:>12} {:>12}",
            "series", "count", "min", "median", "mean", "max"
        ));
        for s in &file.series {
            if s.is_empty() {
                continue;
            }
            lines.push(format!(
                "  {:<34} {:>7} {:>12} {:>12} {:>12} {:>12}",
                format!("{} ({})", s.name, s.unit),
                s.count,
                fmt_opt(s.min),
                fmt_opt(s.median),
                fmt_opt(s.mean),
                fmt_opt(s.max)
            ));
        }
        let empty: Vec<&str> = file
            .series
            .iter()
            .filter(|s| s.is_empty())
            .map(|s| s.name.as_str())
            .collect();
        if !empty.is_empty() {
            lines.push(format!("  empty: {}", empty.join(", ")));
        }
        lines.push(String::new());
    }

    if !report.failures.is_empty() {
        lines.push("=".repeat(80));
        lines.push("FAILED FILES".to_string());
        lines.push("=".repeat(80));
        for failure in &report.failures {
            lines.push(format!("{}: {}", failure.path, failure.error));
        }
        lines.push(String::new());
    }

    lines.push("=".repeat(80));
    lines.join("\n")
}

/// Generate human-readable text report
pub fn generate_text_report(report: &AnalysisReport, output_path: &Path) -> Result<()> {
    fs::write(output_path, render_text_report(report))
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Print a summary to stdout
pub fn print_summary(report: &AnalysisReport) {
    println!("\n=== SIMULATION LOG METRICS SUMMARY ===\n");
    println!(
        "Files: {} processed, {} failed",
        report.metadata.processed_files,
        report.failures.len()
    );

    for file in &report.files {
        println!("\n{}", file.source);
        for key in [
            SeriesKey::WebRttNormal,
            SeriesKey::WebRttLowLatency,
            SeriesKey::ClientUtilization,
            SeriesKey::RelayUtilization,
        ] {
            if let Some(s) = file.series(key) {
                if s.is_empty() {
                    println!("  {}: no data", s.name);
                } else {
                    println!(
                        "  {}: n={} median={} {}",
                        s.name,
                        s.count,
                        fmt_opt(s.median),
                        s.unit
                    );
                }
            }
        }
        if let Some(s) = file.series(SeriesKey::Memory).filter(|s| !s.is_empty()) {
            println!("  memory: max={} MB over {} heartbeats", fmt_opt(s.max), s.count);
        }
    }

    for failure in &report.failures {
        println!("\nFAILED {}: {}", failure.path, failure.error);
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_stats() {
        let stats = SeriesStats::new(SeriesKey::ClientGoodput, &[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.median, Some(2.5));
        assert_eq!(stats.mean, Some(2.5));
        assert_eq!(stats.max, Some(4.0));
        assert_eq!(stats.unit, "kbps");

        let empty = SeriesStats::new(SeriesKey::Memory, &[]);
        assert!(empty.is_empty());
        assert_eq!(empty.median, None);
        assert_eq!(empty.mean, None);
    }

    #[test]
    fn test_report_marks_empty_series() {
        let mut metrics = FileMetrics {
            source: "tor.log".to_string(),
            ..Default::default()
        };
        metrics.series.insert(SeriesKey::Memory, vec![100.0, 300.0]);

        let report = AnalysisReport::from_metrics(&[metrics]);
        assert_eq!(report.metadata.total_files, 1);
        let file = &report.files[0];
        assert_eq!(file.series.len(), SeriesKey::ALL.len());
        assert_eq!(file.series(SeriesKey::Memory).and_then(|s| s.median), Some(200.0));
        assert!(file.series(SeriesKey::WebRttNormal).is_some_and(SeriesStats::is_empty));

        let text = render_text_report(&report);
        assert!(text.contains("memory (MB)"));
        assert!(text.contains("empty: web_rtt_normal"));
    }

    #[test]
    fn test_json_report_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = AnalysisReport::from_metrics(&[FileMetrics::default()]);
        generate_json_report(&report, &path).unwrap();

        let parsed: AnalysisReport =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.files.len(), 1);
        assert!(parsed.failures.is_empty());
    }
}
