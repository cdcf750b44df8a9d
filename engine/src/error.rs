//! Error types for the simulation engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Errors raised while building inputs for, or running, a simulation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid market series: {message}")]
    InvalidSeries { message: String },

    #[error("Market series has no {0} column")]
    MissingColumn(String),

    #[error("Event at minute {time} is outside horizon of {n_minutes} minutes")]
    EventOutOfRange { time: usize, n_minutes: usize },

    #[error("Length mismatch: {left} has {left_len} entries, {right} has {right_len}")]
    LengthMismatch {
        left: String,
        left_len: usize,
        right: String,
        right_len: usize,
    },

    #[error("Distribution error: {message}")]
    Distribution { message: String },
}

impl SimulationError {
    /// Create an invalid parameter error
    pub fn invalid_parameter<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid series error
    pub fn invalid_series<S: Into<String>>(message: S) -> Self {
        Self::InvalidSeries {
            message: message.into(),
        }
    }

    /// Create a distribution error
    pub fn distribution<S: Into<String>>(message: S) -> Self {
        Self::Distribution {
            message: message.into(),
        }
    }

    pub fn length_mismatch(left: &str, left_len: usize, right: &str, right_len: usize) -> Self {
        Self::LengthMismatch {
            left: left.to_string(),
            left_len,
            right: right.to_string(),
            right_len,
        }
    }
}
