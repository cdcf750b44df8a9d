//! Error types for the batch driver

use thiserror::Error;

/// Result type alias for batch operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Errors raised while configuring or driving batches of simulation draws
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] streamsim_engine::SimulationError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input error at line {line}: {message}")]
    Input { line: usize, message: String },

    #[error("Calibration error: {message}")]
    Calibration { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchError {
    /// Create an input error
    pub fn input<S: Into<String>>(line: usize, message: S) -> Self {
        Self::Input {
            line,
            message: message.into(),
        }
    }

    /// Create a calibration error
    pub fn calibration<S: Into<String>>(message: S) -> Self {
        Self::Calibration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }
}
