//! Refund-rate calibration
//!
//! Finds the refund rate at which the liquidator's share of combined
//! drawdown equals its share of combined profit.

use tracing::debug;

use streamsim_engine::{MarketSeries, SeededRng, Simulation, SimulationParams};

use crate::error::{BatchError, Result};

/// Bracket searched for the refund rate
pub const REFUND_RATE_BRACKET: (f64, f64) = (0.00001, 0.99999);

const XTOL: f64 = 2e-12;
const RTOL: f64 = 4.0 * f64::EPSILON;
const MAX_ITER: usize = 100;

/// Root of `f` inside `[a, b]` by bisection
///
/// `f(a)` and `f(b)` must have opposite signs. Stops once the bracket is
/// narrower than `2e-12 + 4ε·|x|`.
pub fn bisect<F>(mut f: F, a: f64, b: f64) -> Result<f64>
where
    F: FnMut(f64) -> Result<f64>,
{
    let fa = f(a)?;
    let fb = f(b)?;
    if fa.is_nan() || fb.is_nan() {
        return Err(BatchError::calibration("objective is undefined at the bracket ends"));
    }
    if fa * fb > 0.0 {
        return Err(BatchError::calibration(format!(
            "f(a) and f(b) must have different signs: f({})={}, f({})={}",
            a, fa, b, fb
        )));
    }
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }

    let mut lo = a;
    let mut dm = b - a;
    for _ in 0..MAX_ITER {
        dm *= 0.5;
        let xm = lo + dm;
        let fm = f(xm)?;
        if fm * fa >= 0.0 {
            lo = xm;
        }
        if fm == 0.0 || dm.abs() < XTOL + RTOL * xm.abs() {
            return Ok(xm);
        }
    }

    Err(BatchError::calibration(format!(
        "bisection did not converge in {} iterations",
        MAX_ITER
    )))
}

/// Solves for the refund rate of one draw
///
/// Every evaluation reruns the draw with the same seed, so the objective is a
/// deterministic function of the refund rate.
pub struct RefundCalibrator<'a> {
    market: &'a MarketSeries,
    params: SimulationParams,
    seed: u64,
}

impl<'a> RefundCalibrator<'a> {
    pub fn new(market: &'a MarketSeries, params: SimulationParams, seed: u64) -> Self {
        Self { market, params, seed }
    }

    /// Liquidator drawdown share minus liquidator profit share
    pub fn objective(&self, refund_rate: f64) -> Result<f64> {
        let params = self.params.with_refund_rate(refund_rate);
        let mut rng = SeededRng::new(self.seed);
        let run = Simulation::new(self.market, params)?.run(&mut rng)?;
        Ok(run.metrics.liquidator_md_percent - run.metrics.liquidator_percent_of_profit)
    }

    pub fn calibrate(&self) -> Result<f64> {
        let (a, b) = REFUND_RATE_BRACKET;
        let rate = bisect(|r| self.objective(r), a, b)?;
        debug!(refund_rate = rate, seed = self.seed, "Calibrated refund rate");
        Ok(rate)
    }
}
