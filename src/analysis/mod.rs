//! Metrics extraction from network-privacy simulator logs.
//!
//! Lines are classified, their fields extracted, and per-entity measurements
//! aggregated into the distributions and time series that get plotted. Each
//! log's series can be persisted and read back without re-parsing.

pub mod types;
pub mod error;
pub mod classifier;
pub mod extractor;
pub mod aggregator;
pub mod distribution;
pub mod log_parser;
pub mod dat_file;
pub mod report;

pub use types::*;
pub use error::{FieldError, ParseError};
pub use aggregator::ParseState;
pub use distribution::{build_cdf, build_time_series, DistributionSeries};
pub use log_parser::{parse_log_file, process_all_logs, LogOutcome, ParseOptions, ParsedLog};
pub use dat_file::{read_series_file, read_series_files, write_series_file};
pub use report::{generate_json_report, generate_text_report, print_summary, AnalysisReport};
