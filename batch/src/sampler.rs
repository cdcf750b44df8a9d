//! Parameter sampling for Monte-Carlo draws

use std::collections::HashMap;

use streamsim_engine::{SimRng, SimulationParams};

use crate::config::{ParameterRange, RangeScale};
use crate::error::Result;

/// Source of parameter sets, one per draw
pub trait ParameterSampler: Send + Sync {
    fn sample(&self, rng: &mut dyn SimRng) -> Result<SimulationParams>;
}

/// Draws each parameter independently from a uniform or log-uniform range
#[derive(Debug, Clone)]
pub struct RangeSampler {
    ranges: Vec<ParameterRange>,
}

impl RangeSampler {
    pub fn new(ranges: Vec<ParameterRange>) -> Self {
        Self { ranges }
    }
}

/// Map a uniform draw in [0, 1) onto a range
pub fn draw_in_range(range: &ParameterRange, u: f64) -> f64 {
    match range.scale {
        RangeScale::Uniform => range.low + u * (range.high - range.low),
        RangeScale::LogUniform => {
            let (lo, hi) = (range.low.ln(), range.high.ln());
            (lo + u * (hi - lo)).exp()
        }
    }
}

impl ParameterSampler for RangeSampler {
    fn sample(&self, rng: &mut dyn SimRng) -> Result<SimulationParams> {
        let values: HashMap<String, f64> = self
            .ranges
            .iter()
            .map(|range| (range.name.clone(), draw_in_range(range, rng.next_uniform())))
            .collect();

        Ok(SimulationParams::from_map(&values)?)
    }
}
