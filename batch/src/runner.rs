//! Parallel batch driver
//!
//! Workers are independent: each owns a seeded RNG, runs its batches to
//! completion and writes its own files. A draw that fails is recorded with a
//! fallback and the batch carries on.

use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{info, warn};

use streamsim_engine::{MarketSeries, SeededRng, Simulation, SimulationParams};

use crate::calibration::RefundCalibrator;
use crate::config::BatchConfig;
use crate::error::{BatchError, Result};
use crate::results::{batch_file_name, ResultRow, ResultTable};
use crate::sampler::ParameterSampler;

/// Refund rate substituted when calibration fails
pub const FALLBACK_REFUND_RATE: f64 = 0.0;

/// Per-draw settings shared by all workers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawOptions {
    pub calibrate_refund_rate: bool,
    pub gas_prediction_ability: Option<f64>,
}

impl From<&BatchConfig> for DrawOptions {
    fn from(config: &BatchConfig) -> Self {
        Self {
            calibrate_refund_rate: config.run.calibrate_refund_rate,
            gas_prediction_ability: config.run.gas_prediction_ability,
        }
    }
}

/// Sample, calibrate and simulate one draw
///
/// Never returns an error: sampling or simulation failures produce a failed
/// row, and a calibration failure falls back to a zero refund rate.
pub fn run_draw(
    market: &MarketSeries,
    sampler: &dyn ParameterSampler,
    options: DrawOptions,
    rng: &mut SeededRng,
    draw: usize,
) -> ResultRow {
    let seed = rng.next_seed();
    let mut row = ResultRow {
        draw,
        seed,
        failed: false,
        params: None,
        metrics: None,
    };

    let mut params = match sampler.sample(rng) {
        Ok(params) => params,
        Err(e) => {
            warn!(draw, error = %e, "Parameter sampling failed");
            row.failed = true;
            return row;
        }
    };
    if let Some(hours) = options.gas_prediction_ability {
        params.gas_prediction_ability = hours;
    }

    if options.calibrate_refund_rate {
        params = match RefundCalibrator::new(market, params, seed).calibrate() {
            Ok(rate) => params.with_refund_rate(rate),
            Err(e) => {
                warn!(draw, error = %e, "Refund rate calibration failed, using fallback");
                row.failed = true;
                params.with_refund_rate(FALLBACK_REFUND_RATE)
            }
        };
    }
    row.params = Some(params);

    match simulate(market, params, seed) {
        Ok(metrics) => row.metrics = Some(metrics),
        Err(e) => {
            warn!(draw, error = %e, "Simulation failed");
            row.failed = true;
        }
    }

    row
}

/// Rerun a recorded draw from its parameters and seed
///
/// The parameters already carry the calibrated refund rate, so calibration is
/// not repeated and the metrics match the recorded row.
pub fn replay_draw(market: &MarketSeries, params: SimulationParams, seed: u64, draw: usize) -> ResultRow {
    let mut row = ResultRow {
        draw,
        seed,
        failed: false,
        params: Some(params),
        metrics: None,
    };

    match simulate(market, params, seed) {
        Ok(metrics) => row.metrics = Some(metrics),
        Err(e) => {
            warn!(draw, seed, error = %e, "Replayed simulation failed");
            row.failed = true;
        }
    }

    row
}

fn simulate(
    market: &MarketSeries,
    params: SimulationParams,
    seed: u64,
) -> Result<streamsim_engine::RunMetrics> {
    let mut rng = SeededRng::new(seed);
    Ok(Simulation::new(market, params)?.run(&mut rng)?.metrics)
}

/// Summary of a completed batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub draws: usize,
    pub failed: usize,
    pub files: Vec<PathBuf>,
}

/// Fans draws out over independent workers
pub struct BatchRunner<'a, S: ParameterSampler> {
    config: &'a BatchConfig,
    market: &'a MarketSeries,
    sampler: S,
}

impl<'a, S: ParameterSampler> BatchRunner<'a, S> {
    pub fn new(config: &'a BatchConfig, market: &'a MarketSeries, sampler: S) -> Self {
        Self { config, market, sampler }
    }

    /// Run one worker's draws for a single batch
    pub fn run_batch(&self, rng: &mut SeededRng, draws: usize) -> ResultTable {
        let options = DrawOptions::from(self.config);
        let mut table = ResultTable::default();
        for draw in 0..draws {
            table.push(run_draw(self.market, &self.sampler, options, rng, draw));
        }
        table
    }

    fn run_worker(&self, worker: usize) -> Result<BatchSummary> {
        let run = &self.config.run;
        let mut rng = SeededRng::new(run.base_seed.wrapping_add(worker as u64));
        let output_dir = PathBuf::from(&self.config.output.dir);
        let mut summary = BatchSummary::default();

        for batch in 0..run.batches_per_worker {
            let table = self.run_batch(&mut rng, run.draws_per_batch);
            let name = batch_file_name(chrono::Utc::now().timestamp(), worker, batch);
            let path = table.write_to(&output_dir, &name)?;

            info!(
                worker,
                batch,
                draws = table.len(),
                failed = table.failed(),
                path = %path.display(),
                "Wrote batch results"
            );

            summary.draws += table.len();
            summary.failed += table.failed();
            summary.files.push(path);
        }

        Ok(summary)
    }

    /// Run every worker in parallel and merge their summaries
    pub fn run(&self) -> Result<BatchSummary> {
        let workers = self.config.run.workers;
        info!(
            workers,
            batches_per_worker = self.config.run.batches_per_worker,
            draws_per_batch = self.config.run.draws_per_batch,
            "Starting batch run"
        );

        let summaries: Vec<Result<BatchSummary>> = (0..workers)
            .into_par_iter()
            .map(|worker| self.run_worker(worker))
            .collect();

        let mut total = BatchSummary::default();
        for summary in summaries {
            let summary = summary?;
            total.draws += summary.draws;
            total.failed += summary.failed;
            total.files.extend(summary.files);
        }

        if total.draws == 0 {
            return Err(BatchError::internal("batch run produced no draws"));
        }

        info!(draws = total.draws, failed = total.failed, files = total.files.len(), "Batch run complete");
        Ok(total)
    }
}
