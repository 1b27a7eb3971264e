//! Series files: the parsed form of one log, kept so plots can be redrawn
//! without re-reading the raw log.
//!
//! Layout (CSV, gzip when the name ends in `.gz`):
//!
//! ```text
//! #,<source log>,"Row Order: web_rtt_normal, web_rtt_low_latency, ..."
//! web_rtt_normal,0.42,0.97,...
//! web_rtt_low_latency
//! ...
//! ```
//!
//! Values use the shortest text that parses back to the same `f64`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use color_eyre::eyre::{bail, eyre, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rayon::prelude::*;

use super::types::{FileMetrics, SeriesKey};

const HEADER_MARKER: &str = "#";
const ROW_ORDER_PREFIX: &str = "Row Order: ";

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Series file path for a log: `run.log.gz` -> `run.dat.gz`, `run.txt` -> `run.dat.gz`.
///
/// The file lands next to the log unless `output_dir` is given.
pub fn dat_path_for(log_path: &Path, output_dir: Option<&Path>) -> PathBuf {
    let name = log_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = if let Some(pos) = name.rfind(".log") {
        &name[..pos]
    } else if let Some(pos) = name.rfind('.') {
        &name[..pos]
    } else {
        name.as_str()
    };
    let file_name = format!("{}.dat.gz", stem);

    match output_dir {
        Some(dir) => dir.join(file_name),
        None => log_path.with_file_name(file_name),
    }
}

/// Write the header row and one row per series
pub fn write_series<W: Write>(writer: W, metrics: &FileMetrics) -> Result<W> {
    let mut csv = csv::WriterBuilder::new().flexible(true).from_writer(writer);

    let order = SeriesKey::ALL
        .iter()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join(", ");
    let row_order = format!("{}{}", ROW_ORDER_PREFIX, order);
    csv.write_record([HEADER_MARKER, metrics.source.as_str(), row_order.as_str()])
        .context("Failed to write series header")?;

    for (key, values) in metrics.ordered() {
        let mut row = Vec::with_capacity(values.len() + 1);
        row.push(key.name().to_string());
        row.extend(values.iter().map(|v| v.to_string()));
        csv.write_record(&row)
            .with_context(|| format!("Failed to write series {}", key))?;
    }

    csv.into_inner()
        .map_err(|e| eyre!("Failed to flush series rows: {}", e.error()))
}

/// Write a series file, compressing when the path ends in `.gz`
pub fn write_series_file(path: &Path, metrics: &FileMetrics) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create series file {}", path.display()))?;
    let writer = BufWriter::new(file);

    if is_gzip(path) {
        let encoder = write_series(GzEncoder::new(writer, Compression::default()), metrics)?;
        encoder
            .finish()
            .with_context(|| format!("Failed to finish {}", path.display()))?
            .flush()?;
    } else {
        write_series(writer, metrics)?.flush()?;
    }

    log::info!("Series written to {}", path.display());
    Ok(())
}

/// Read series rows back; rows absent from the file come back empty
pub fn read_series<R: Read>(reader: R) -> Result<FileMetrics> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = csv.records();

    let header = match records.next() {
        Some(record) => record.context("Failed to read series header")?,
        None => bail!("Series file is empty"),
    };
    if header.get(0) != Some(HEADER_MARKER) {
        bail!("Series file does not start with a '{}' header row", HEADER_MARKER);
    }

    let mut metrics = FileMetrics {
        source: header.get(1).unwrap_or_default().to_string(),
        series: SeriesKey::ALL.iter().map(|k| (*k, Vec::new())).collect(),
        ..Default::default()
    };

    for (index, record) in records.enumerate() {
        let row = index + 2;
        let record = record.with_context(|| format!("Failed to read series row {}", row))?;
        let name = record.get(0).unwrap_or_default();
        let key = SeriesKey::from_name(name)
            .ok_or_else(|| eyre!("Unknown series {:?} in row {}", name, row))?;
        let values = record
            .iter()
            .skip(1)
            .map(|field| {
                field
                    .parse::<f64>()
                    .with_context(|| format!("Series {} has non-numeric value {:?}", key, field))
            })
            .collect::<Result<Vec<f64>>>()?;
        metrics.series.insert(key, values);
    }

    Ok(metrics)
}

/// Read a series file written by `write_series_file`
pub fn read_series_file(path: &Path) -> Result<FileMetrics> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open series file {}", path.display()))?;
    let reader = BufReader::new(file);

    let metrics = if is_gzip(path) {
        read_series(GzDecoder::new(reader))
    } else {
        read_series(reader)
    };
    metrics.with_context(|| format!("Failed to read series file {}", path.display()))
}

/// Read several series files in parallel, keeping input order.
///
/// The first unreadable file fails the whole batch.
pub fn read_series_files(paths: &[PathBuf]) -> Result<Vec<FileMetrics>> {
    log::info!("Reading {} series files...", paths.len());
    paths
        .par_iter()
        .map(|path| read_series_file(path))
        .collect()
}
