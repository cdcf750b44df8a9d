//! Streamsim batch driver
//!
//! Samples simulation parameters, optionally calibrates each draw's refund
//! rate, runs the engine across parallel workers and writes one CSV table
//! per worker batch.

pub mod calibration;
pub mod config;
pub mod error;
pub mod input;
pub mod results;
pub mod runner;
pub mod sampler;

pub use calibration::{bisect, RefundCalibrator, REFUND_RATE_BRACKET};
pub use config::{BatchConfig, InputConfig, OutputConfig, ParameterRange, RangeScale, RunConfig};
pub use error::{BatchError, Result};
pub use input::{load_market_csv, parse_market_csv};
pub use results::{batch_file_name, ResultRow, ResultTable};
pub use runner::{replay_draw, run_draw, BatchRunner, BatchSummary, DrawOptions, FALLBACK_REFUND_RATE};
pub use sampler::{draw_in_range, ParameterSampler, RangeSampler};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
