//! Analysis configuration.
//!
//! Every field has a default, so an empty YAML document is a valid config.
//!
//! ```yaml
//! variant: per-request
//! warmup: 10m
//! cutoff: 30m
//! threads: 8
//! output_dir: results/dat
//! report_dir: results/reports
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::{LogVariant, ParseOptions, SimNanos};

fn default_write_series() -> bool {
    true
}

/// Settings for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Log layout of the input files
    #[serde(default)]
    pub variant: LogVariant,
    /// Simulated time before which records are ignored
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub warmup: Option<Duration>,
    /// Simulated time after which a log is no longer read
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<Duration>,
    /// Worker threads; 0 lets rayon decide
    #[serde(default)]
    pub threads: usize,
    /// Where series files go; next to each log when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Where JSON and text reports go; no reports when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
    #[serde(default = "default_write_series")]
    pub write_series: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            variant: LogVariant::default(),
            warmup: None,
            cutoff: None,
            threads: 0,
            output_dir: None,
            report_dir: None,
            write_series: default_write_series(),
        }
    }
}

fn to_sim_nanos(duration: Duration, field: &str) -> Result<SimNanos, ValidationError> {
    SimNanos::try_from(duration.as_nanos()).map_err(|_| {
        ValidationError::InvalidTiming(format!(
            "{} of {:?} does not fit in simulated nanoseconds",
            field, duration
        ))
    })
}

impl AnalysisConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let warmup = self.warmup.map(|d| to_sim_nanos(d, "warmup")).transpose()?;
        let cutoff = self.cutoff.map(|d| to_sim_nanos(d, "cutoff")).transpose()?;

        if let (Some(warmup), Some(cutoff)) = (warmup, cutoff) {
            if cutoff <= warmup {
                return Err(ValidationError::InvalidTiming(format!(
                    "cutoff ({} ns) must be later than warmup ({} ns)",
                    cutoff, warmup
                )));
            }
        }

        if self.output_dir.as_ref().is_some_and(|d| d.as_os_str().is_empty()) {
            return Err(ValidationError::InvalidOutput(
                "output_dir must not be empty".to_string(),
            ));
        }
        if self.report_dir.as_ref().is_some_and(|d| d.as_os_str().is_empty()) {
            return Err(ValidationError::InvalidOutput(
                "report_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Parser settings derived from this configuration
    pub fn parse_options(&self) -> Result<ParseOptions, ValidationError> {
        Ok(ParseOptions {
            variant: self.variant,
            warmup_nanos: self
                .warmup
                .map(|d| to_sim_nanos(d, "warmup"))
                .transpose()?
                .unwrap_or(0),
            cutoff_nanos: self.cutoff.map(|d| to_sim_nanos(d, "cutoff")).transpose()?,
        })
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid timing configuration: {0}")]
    InvalidTiming(String),
    #[error("Invalid output configuration: {0}")]
    InvalidOutput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: AnalysisConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert!(config.write_series);

        let options = config.parse_options().unwrap();
        assert_eq!(options.variant, LogVariant::RttMeasurement);
        assert_eq!(options.warmup_nanos, 0);
        assert_eq!(options.cutoff_nanos, None);
    }

    #[test]
    fn test_durations_become_sim_nanos() {
        let yaml = "variant: per-request\nwarmup: 10m\ncutoff: 30m\n";
        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        let options = config.parse_options().unwrap();
        assert_eq!(options.variant, LogVariant::PerRequest);
        assert_eq!(options.warmup_nanos, 600_000_000_000);
        assert_eq!(options.cutoff_nanos, Some(1_800_000_000_000));
    }

    #[test]
    fn test_cutoff_before_warmup_rejected() {
        let config = AnalysisConfig {
            warmup: Some(Duration::from_secs(600)),
            cutoff: Some(Duration::from_secs(600)),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidTiming(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_yaml::from_str::<AnalysisConfig>("stop_time: 30m\n").is_err());
    }
}
