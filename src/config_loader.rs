use crate::config::{AnalysisConfig, ValidationError};
use crate::analysis::LogVariant;
use color_eyre::eyre::{Context, Result};
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<AnalysisConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .with_context(|| format!("Failed to open config {}", config_path.display()))?;

    let config: AnalysisConfig = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse config {}", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Load the config file when one is given, defaults otherwise
pub fn load_or_default(config_path: Option<&Path>) -> Result<AnalysisConfig> {
    match config_path {
        Some(path) => load_config(path),
        None => Ok(AnalysisConfig::default()),
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub variant: Option<LogVariant>,
    pub warmup: Option<Duration>,
    pub cutoff: Option<Duration>,
    pub threads: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub no_series: bool,
}

/// Apply CLI overrides to a configuration
pub fn apply_overrides(
    config: &mut AnalysisConfig,
    overrides: &CliOverrides,
) -> Result<(), ValidationError> {
    if let Some(variant) = overrides.variant {
        info!("Overriding log variant: {}", variant);
        config.variant = variant;
    }
    if let Some(warmup) = overrides.warmup {
        config.warmup = Some(warmup);
    }
    if let Some(cutoff) = overrides.cutoff {
        config.cutoff = Some(cutoff);
    }
    if let Some(threads) = overrides.threads {
        config.threads = threads;
    }
    if let Some(dir) = &overrides.output_dir {
        config.output_dir = Some(dir.clone());
    }
    if let Some(dir) = &overrides.report_dir {
        config.report_dir = Some(dir.clone());
    }
    if overrides.no_series {
        config.write_series = false;
    }

    // Re-validate after applying overrides
    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
variant: per-request
warmup: "5m"
cutoff: "30m"
threads: 4
output_dir: "out/dat"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.variant, LogVariant::PerRequest);
        assert_eq!(config.warmup, Some(Duration::from_secs(300)));
        assert_eq!(config.threads, 4);
        assert_eq!(config.output_dir, Some(PathBuf::from("out/dat")));
        assert_eq!(config.report_dir, None);
    }

    #[test]
    fn test_load_invalid_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "warmup: 30m\ncutoff: 10m\n").unwrap();
        assert!(load_config(temp_file.path()).is_err());

        assert!(load_config(Path::new("/nonexistent/simlog.yaml")).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = AnalysisConfig {
            cutoff: Some(Duration::from_secs(1800)),
            ..Default::default()
        };

        let overrides = CliOverrides {
            variant: Some(LogVariant::PerRequest),
            warmup: Some(Duration::from_secs(60)),
            no_series: true,
            ..Default::default()
        };

        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.variant, LogVariant::PerRequest);
        assert_eq!(config.warmup, Some(Duration::from_secs(60)));
        assert_eq!(config.cutoff, Some(Duration::from_secs(1800)));
        assert!(!config.write_series);
    }

    #[test]
    fn test_overrides_revalidated() {
        let mut config = AnalysisConfig {
            warmup: Some(Duration::from_secs(600)),
            ..Default::default()
        };
        let overrides = CliOverrides {
            cutoff: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        assert!(apply_overrides(&mut config, &overrides).is_err());
    }
}
