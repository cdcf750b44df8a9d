//! Streamsim Engine
//!
//! Monte-Carlo core for estimating liquidator and gas tank P&L in a
//! stream-liquidation protocol.
//!
//! ## Pipeline
//! 1. **events**: stream openings, sizes, closings and rational reclassification
//! 2. **binning**: per-minute counts and representative sizes
//! 3. **pnl**: naive or gas-predicting liquidator, plus gas tank settlement
//! 4. **metrics**: drawdowns, profit shares and closure rates
//!
//! A run is fully determined by its market series, parameters and RNG seed.

pub mod binning;
pub mod error;
pub mod events;
pub mod market;
pub mod metrics;
pub mod params;
pub mod pnl;
pub mod rng;
pub mod simulation;
pub mod units;

pub use binning::{bin_counts, bin_events, expand_counts, Binned, BinnedSeries};
pub use error::{Result, SimulationError};
pub use events::{EventSet, EventSimulator, StreamEvents};
pub use market::MarketSeries;
pub use metrics::{extract_metrics, max_drawdown, Drawdown, RunMetrics, METRIC_NAMES};
pub use params::{SimulationParams, PARAMETER_NAMES};
pub use pnl::{best_execution, Execution, LiquidatorMode, PnlEngine, PnlSeries};
pub use rng::{SeededRng, SimRng};
pub use simulation::{EventSummary, Simulation, SimulationRun};

/// Version of the simulation engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
