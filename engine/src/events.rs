//! Stream lifecycle simulation
//!
//! Streams open uniformly over the horizon, draw a gamma-distributed flow
//! rate, and close after the first of two competing exponential hazards
//! (self-close vs. accidental liquidation). Self-closes that cost the user
//! more than the margin they would forfeit are then turned into
//! liquidations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SimulationError};
use crate::market::MarketSeries;
use crate::params::SimulationParams;
use crate::rng::SimRng;
use crate::units::{gwei_to_eth, minute_to_month, stream_rate_to_margin, transaction_cost, LIQUIDATION_GAS};

/// Event times with the flow rate of each stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSet {
    pub times: Vec<usize>,
    pub sizes: Vec<f64>,
}

impl EventSet {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    fn push(&mut self, time: usize, size: f64) {
        self.times.push(time);
        self.sizes.push(size);
    }
}

/// All stream events produced by one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamEvents {
    /// Streams that actually opened
    pub opened: EventSet,

    /// Accidental liquidations followed by deliberate ones
    pub liquidated: EventSet,

    pub self_closed: EventSet,

    /// Streams still open at the end of the horizon
    pub censored: usize,

    /// Self-closes turned into liquidations by the rational-actor check
    pub reclassified: usize,

    /// Candidate streams rejected by the open-viability filter
    pub unviable: usize,
}

impl StreamEvents {
    /// Streams that closed inside the horizon
    pub fn closed(&self) -> usize {
        self.liquidated.len() + self.self_closed.len()
    }
}

/// Number of streams expected to open over the horizon, floored
pub fn expected_stream_openings(n_minutes: usize, params: &SimulationParams) -> usize {
    (params.monthly_opened_streams * minute_to_month(n_minutes as f64)).floor() as usize
}

/// Draw opening minutes uniformly over `[0, n_minutes)`
pub fn sample_open_times<R: SimRng + ?Sized>(
    n_minutes: usize,
    params: &SimulationParams,
    rng: &mut R,
) -> Vec<usize> {
    if n_minutes == 0 {
        return Vec::new();
    }
    let count = expected_stream_openings(n_minutes, params);
    (0..count).map(|_| rng.next_index(n_minutes)).collect()
}

/// Draw one flow rate per stream
///
/// Scale is `mean / shape`, so the sample mean is `average_stream_size`.
pub fn sample_stream_sizes<R: SimRng + ?Sized>(
    count: usize,
    params: &SimulationParams,
    rng: &mut R,
) -> Result<Vec<f64>> {
    let shape = params.stream_size_shape;
    let scale = params.average_stream_size / shape;
    (0..count).map(|_| rng.next_gamma(shape, scale)).collect()
}

/// Whether a stream opened at `time` with flow rate `size` is worth opening
///
/// The monthly flow must exceed the opening cost (gas plus upfront fee, in
/// quote currency) scaled by `cost_ratio`.
pub fn is_viable_open(
    time: usize,
    size: f64,
    market: &MarketSeries,
    params: &SimulationParams,
    cost_ratio: f64,
) -> bool {
    let native_cost = LIQUIDATION_GAS * gwei_to_eth(market.median_gas_price()[time]) + params.upfront_fee;
    size > cost_ratio * native_cost * market.price()[time]
}

/// Whether a self-closing user would rather be liquidated
///
/// True when the gas to self-close plus the savings the user demands exceeds
/// the margin forfeited to the liquidator.
pub fn prefers_liquidation(
    time: usize,
    size: f64,
    market: &MarketSeries,
    params: &SimulationParams,
) -> bool {
    let self_closing_cost = transaction_cost(market.median_gas_price()[time], market.price()[time])
        + params.min_self_liquidation_savings;
    self_closing_cost > stream_rate_to_margin(size, params.upfront_hours)
}

/// Mask over `self_closed` marking users who deliberately default
pub fn deliberate_liquidation_mask(
    self_closed: &EventSet,
    market: &MarketSeries,
    params: &SimulationParams,
) -> Vec<bool> {
    self_closed
        .times
        .iter()
        .zip(&self_closed.sizes)
        .map(|(&t, &size)| prefers_liquidation(t, size, market, params))
        .collect()
}

/// Outcome of a single stream before reclassification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closing {
    Liquidated(usize),
    SelfClosed(usize),
    /// Still open when the horizon ends
    Censored,
}

/// Race the two closing hazards for a stream opened at `open_time`
pub fn sample_closing<R: SimRng + ?Sized>(
    open_time: usize,
    n_minutes: usize,
    prob_liquidated: f64,
    prob_self_closed: f64,
    rng: &mut R,
) -> Result<Closing> {
    let until_liquidated = rng.next_exponential(prob_liquidated)?;
    let until_self_closed = rng.next_exponential(prob_self_closed)?;
    let wait = until_liquidated.min(until_self_closed);

    let close = open_time as f64 + wait;
    if !close.is_finite() || close >= n_minutes as f64 {
        return Ok(Closing::Censored);
    }

    let close = close.floor() as usize;
    if until_liquidated < until_self_closed {
        Ok(Closing::Liquidated(close))
    } else {
        Ok(Closing::SelfClosed(close))
    }
}

/// Move deliberate defaults from the self-closed set into the liquidated set
///
/// Reclassified events keep their time and size and are appended after the
/// existing liquidations. Returns the number of events moved.
pub fn reclassify(
    liquidated: &mut EventSet,
    self_closed: &mut EventSet,
    mask: &[bool],
) -> Result<usize> {
    if mask.len() != self_closed.len() {
        return Err(SimulationError::length_mismatch(
            "reclassification mask",
            mask.len(),
            "self-closed events",
            self_closed.len(),
        ));
    }

    let mut kept = EventSet::default();
    let mut moved = 0;
    for ((&time, &size), &deliberate) in self_closed.times.iter().zip(&self_closed.sizes).zip(mask) {
        if deliberate {
            liquidated.push(time, size);
            moved += 1;
        } else {
            kept.push(time, size);
        }
    }
    *self_closed = kept;
    Ok(moved)
}

/// Generates the stream events for one run
pub struct EventSimulator<'a> {
    market: &'a MarketSeries,
    params: &'a SimulationParams,
}

impl<'a> EventSimulator<'a> {
    pub fn new(market: &'a MarketSeries, params: &'a SimulationParams) -> Self {
        Self { market, params }
    }

    /// Open, size, close and reclassify every stream in the horizon
    pub fn simulate<R: SimRng + ?Sized>(&self, rng: &mut R) -> Result<StreamEvents> {
        let n_minutes = self.market.len();
        let mut events = StreamEvents::default();

        let candidate_times = sample_open_times(n_minutes, self.params, rng);
        let candidate_sizes = sample_stream_sizes(candidate_times.len(), self.params, rng)?;

        for (&time, &size) in candidate_times.iter().zip(&candidate_sizes) {
            let viable = match self.params.lowest_stream_cost_ratio {
                Some(ratio) => is_viable_open(time, size, self.market, self.params, ratio),
                None => true,
            };
            if viable {
                events.opened.push(time, size);
            } else {
                events.unviable += 1;
            }
        }

        let prob_liquidated = self.params.prob_liquidated();
        let prob_self_closed = self.params.prob_self_closed();

        for (&open, &size) in events.opened.times.iter().zip(&events.opened.sizes) {
            match sample_closing(open, n_minutes, prob_liquidated, prob_self_closed, rng)? {
                Closing::Liquidated(t) => events.liquidated.push(t, size),
                Closing::SelfClosed(t) => events.self_closed.push(t, size),
                Closing::Censored => events.censored += 1,
            }
        }

        let mask = deliberate_liquidation_mask(&events.self_closed, self.market, self.params);
        events.reclassified = reclassify(&mut events.liquidated, &mut events.self_closed, &mask)?;

        debug!(
            opened = events.opened.len(),
            unviable = events.unviable,
            liquidated = events.liquidated.len(),
            self_closed = events.self_closed.len(),
            reclassified = events.reclassified,
            censored = events.censored,
            "Simulated stream events"
        );

        Ok(events)
    }
}
