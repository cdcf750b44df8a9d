//! Configuration management for batch runs
//!
//! Loads from a YAML file, or layers defaults, an optional file and
//! `STREAMSIM__*` environment variables through the `config` crate.

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};

/// Batch driver configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Market data input
    pub input: InputConfig,

    /// Where result tables are written
    pub output: OutputConfig,

    /// Worker and draw counts
    pub run: RunConfig,

    /// Sampling ranges, in output column order
    pub parameters: Vec<ParameterRange>,
}

/// Market data input settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InputConfig {
    /// CSV file with per-minute market observations
    pub path: String,
}

/// Result output settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory for result CSV files
    pub dir: String,
}

/// Batch sizing and per-draw behaviour
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunConfig {
    /// Independent workers, each with its own RNG and output files
    pub workers: usize,

    /// Result files written by each worker
    pub batches_per_worker: usize,

    /// Draws per result file
    pub draws_per_batch: usize,

    /// Worker `i` is seeded with `base_seed + i`
    pub base_seed: u64,

    /// Solve for the refund rate that equalizes liquidator drawdown share and profit share
    pub calibrate_refund_rate: bool,

    /// Pin the liquidator's gas foresight (hours) instead of sampling it
    pub gas_prediction_ability: Option<f64>,
}

/// How a parameter is drawn between `low` and `high`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeScale {
    Uniform,
    LogUniform,
}

/// Sampling range for one named parameter
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParameterRange {
    pub name: String,
    pub low: f64,
    pub high: f64,
    pub scale: RangeScale,
}

impl ParameterRange {
    pub fn new(name: &str, low: f64, high: f64, scale: RangeScale) -> Self {
        Self {
            name: name.to_string(),
            low,
            high,
            scale,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        use RangeScale::{LogUniform, Uniform};

        Self {
            input: InputConfig {
                path: "input_data.csv".to_string(),
            },
            output: OutputConfig {
                dir: "sim_output".to_string(),
            },
            run: RunConfig {
                workers: num_cpus::get().saturating_sub(1).max(1),
                batches_per_worker: 500,
                draws_per_batch: 100,
                base_seed: 0,
                calibrate_refund_rate: true,
                gas_prediction_ability: Some(0.0),
            },
            parameters: vec![
                ParameterRange::new("upfront_fee", 0.002, 0.05, LogUniform),
                ParameterRange::new("monthly_opened_streams", 100.0, 10_000.0, LogUniform),
                ParameterRange::new("average_stream_lifetime", 3.0, 250.0, LogUniform),
                ParameterRange::new("percent_accidentally_liquidated_per_month", 0.2, 60.0, LogUniform),
                ParameterRange::new("average_stream_size", 100.0, 10_000.0, LogUniform),
                ParameterRange::new("upfront_hours", 0.0, 20.0, Uniform),
                ParameterRange::new("refund_rate", 0.0, 1.0, Uniform),
                ParameterRange::new("min_self_liquidation_savings", 2.0, 50.0, Uniform),
                ParameterRange::new("gas_prediction_ability", 0.0, 2.0, Uniform),
                ParameterRange::new("lowest_stream_cost_ratio", 0.8, 4.0, Uniform),
            ],
        }
    }
}

impl BatchConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Layer defaults, an optional config file and environment overrides
    pub fn load(path: Option<&str>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())?;
        let mut builder = Config::builder().add_source(defaults);

        builder = match path {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("config/streamsim").required(false)),
        };

        let config: Self = builder
            .add_source(Environment::with_prefix("STREAMSIM").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.run.workers == 0 {
            return Err(ConfigError::Message("workers must be greater than 0".into()));
        }
        if self.run.draws_per_batch == 0 {
            return Err(ConfigError::Message("draws_per_batch must be greater than 0".into()));
        }
        if let Some(hours) = self.run.gas_prediction_ability {
            if !hours.is_finite() || hours < 0.0 {
                return Err(ConfigError::Message(format!(
                    "gas_prediction_ability override must be >= 0, got {}",
                    hours
                )));
            }
        }

        for (i, range) in self.parameters.iter().enumerate() {
            if !range.low.is_finite() || !range.high.is_finite() || range.low > range.high {
                return Err(ConfigError::Message(format!(
                    "Invalid range for {}: [{}, {}]",
                    range.name, range.low, range.high
                )));
            }
            if range.scale == RangeScale::LogUniform && range.low <= 0.0 {
                return Err(ConfigError::Message(format!(
                    "Log-uniform range for {} must be strictly positive",
                    range.name
                )));
            }
            if self.parameters[..i].iter().any(|r| r.name == range.name) {
                return Err(ConfigError::Message(format!("Duplicate parameter range: {}", range.name)));
            }
        }

        Ok(())
    }

    /// Save configuration to YAML file (for generating examples)
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| BatchError::internal(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, yaml)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BatchConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.parameters.len(), 10);

        let fee = &config.parameters[0];
        assert_eq!(fee.name, "upfront_fee");
        assert_eq!(fee.scale, RangeScale::LogUniform);
        assert_eq!(fee.low, 0.002);
        assert_eq!(config.run.gas_prediction_ability, Some(0.0));
    }

    #[test]
    fn test_rejects_non_positive_log_range() {
        let mut config = BatchConfig::default();
        config.parameters.push(ParameterRange::new("stream_size_shape", 0.0, 8.0, RangeScale::LogUniform));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_range() {
        let mut config = BatchConfig::default();
        config.parameters.push(ParameterRange::new("upfront_fee", 0.1, 0.2, RangeScale::Uniform));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_applies_env_overrides() {
        std::env::set_var("STREAMSIM__RUN__WORKERS", "7");
        std::env::set_var("STREAMSIM__OUTPUT__DIR", "env_output");
        let loaded = BatchConfig::load(None);
        std::env::remove_var("STREAMSIM__RUN__WORKERS");
        std::env::remove_var("STREAMSIM__OUTPUT__DIR");

        let config = loaded.unwrap();
        assert_eq!(config.run.workers, 7);
        assert_eq!(config.output.dir, "env_output");
        assert_eq!(config.parameters, BatchConfig::default().parameters);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = BatchConfig::default();
        config.run.workers = 3;
        let temp_path = std::env::temp_dir().join("test_streamsim_config.yaml");

        // Save
        config.save_to_file(&temp_path).unwrap();

        // Load
        let loaded = BatchConfig::from_file(&temp_path).unwrap();

        // Verify
        assert_eq!(loaded, config);

        // Cleanup
        std::fs::remove_file(temp_path).ok();
    }
}
