//! # simlog-metrics - Metrics extraction for network-privacy simulator logs
//!
//! This library turns the line-oriented logs of anonymity-network
//! simulations into per-entity goodput and utilization, latency
//! distributions, and simulator heartbeat time series.
//!
//! ## Overview
//!
//! A log is streamed once, in order. Each line is classified, the fields of
//! relevant lines are extracted by fixed token position, and measurements
//! are folded into a per-file parse state. The finished state becomes a set
//! of named series that is written to a compressed series file, so plots
//! can be redrawn without touching the raw log again.
//!
//! ## Key Features
//!
//! - **Two log layouts**: round-trip measurements and per-request logs
//! - **Per-entity metrics**: goodput (kbps) and utilization (% of declared bandwidth)
//! - **Latency CDFs**: web page round-trip times per priority class
//! - **Heartbeats**: memory, message and datagram counters over time
//! - **Parallel**: independent files are parsed on a rayon pool
//!
//! ## Architecture
//!
//! - `analysis`: classification, extraction, aggregation, series files and reports
//! - `config`: analysis settings and their validation
//! - `config_loader`: YAML loading and command-line overrides
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use simlog_metrics::{analysis, config_loader};
//!
//! let config = config_loader::load_or_default(None)?;
//! let options = config.parse_options()?;
//!
//! let logs = vec![PathBuf::from("runs/braids-50.log.gz")];
//! for outcome in analysis::process_all_logs(&logs, &options, None, true) {
//!     let parsed = outcome.result?;
//!     println!("{}: {} records", parsed.path.display(), parsed.stats.records);
//! }
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Domain errors are `thiserror` enums; plumbing returns
//! `color_eyre::eyre::Result` with context attached at each file boundary.

pub mod analysis;
pub mod config;
pub mod config_loader;
