//! One full simulation draw: events → bins → P&L → metrics

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::binning::BinnedSeries;
use crate::error::Result;
use crate::events::{EventSimulator, StreamEvents};
use crate::market::MarketSeries;
use crate::metrics::{extract_metrics, RunMetrics};
use crate::params::SimulationParams;
use crate::pnl::{PnlEngine, PnlSeries};
use crate::rng::SimRng;

/// Event counts kept with a run after the raw event lists are binned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub opened: usize,
    pub liquidated: usize,
    pub self_closed: usize,
    pub reclassified: usize,
    pub censored: usize,
    pub unviable: usize,
}

impl From<&StreamEvents> for EventSummary {
    fn from(events: &StreamEvents) -> Self {
        Self {
            opened: events.opened.len(),
            liquidated: events.liquidated.len(),
            self_closed: events.self_closed.len(),
            reclassified: events.reclassified,
            censored: events.censored,
            unviable: events.unviable,
        }
    }
}

/// Everything derived from one draw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    pub events: EventSummary,
    pub binned: BinnedSeries,
    pub pnl: PnlSeries,
    pub metrics: RunMetrics,
}

/// Runs the full pipeline for one parameter set over one market series
pub struct Simulation<'a> {
    market: &'a MarketSeries,
    params: SimulationParams,
}

impl<'a> Simulation<'a> {
    pub fn new(market: &'a MarketSeries, params: SimulationParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { market, params })
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    #[instrument(skip_all, fields(minutes = self.market.len()))]
    pub fn run<R: SimRng + ?Sized>(&self, rng: &mut R) -> Result<SimulationRun> {
        let events = EventSimulator::new(self.market, &self.params).simulate(rng)?;
        let binned = BinnedSeries::from_events(&events, self.market.len())?;
        let pnl = PnlEngine::new(self.market, &self.params).compute(&binned)?;
        let metrics = extract_metrics(self.market, &binned, &pnl, self.params.upfront_fee)?;

        debug!(
            peak_open_streams = binned.open_streams().into_iter().max().unwrap_or(0),
            total_profit = metrics.total_profit,
            liquidator_profit = metrics.liquidator_profit,
            "Simulation run complete"
        );

        Ok(SimulationRun {
            events: EventSummary::from(&events),
            binned,
            pnl,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRng;

    #[test]
    fn test_invalid_params_rejected_before_running() {
        let market = MarketSeries::constant(10, 1.0, 1.0).unwrap();
        let params = SimulationParams {
            upfront_fee: 0.01,
            monthly_opened_streams: 100.0,
            average_stream_lifetime: 0.0,
            percent_accidentally_liquidated_per_month: 1.0,
            average_stream_size: 100.0,
            upfront_hours: 1.0,
            refund_rate: 0.0,
            min_self_liquidation_savings: 1.0,
            gas_prediction_ability: 0.0,
            lowest_stream_cost_ratio: None,
            stream_size_shape: 4.0,
        };
        assert!(Simulation::new(&market, params).is_err());
    }

    #[test]
    fn test_run_counts_are_consistent() {
        let market = MarketSeries::constant(5000, 20.0, 1500.0).unwrap();
        let params = SimulationParams {
            upfront_fee: 0.01,
            monthly_opened_streams: 20_000.0,
            average_stream_lifetime: 1.0,
            percent_accidentally_liquidated_per_month: 20.0,
            average_stream_size: 2000.0,
            upfront_hours: 8.0,
            refund_rate: 0.3,
            min_self_liquidation_savings: 5.0,
            gas_prediction_ability: 0.0,
            lowest_stream_cost_ratio: None,
            stream_size_shape: 4.0,
        };
        let mut rng = SeededRng::new(3);
        let run = Simulation::new(&market, params).unwrap().run(&mut rng).unwrap();

        let e = run.events;
        assert_eq!(e.liquidated + e.self_closed + e.censored, e.opened);
        assert_eq!(run.metrics.n_opened as usize, e.opened);
        assert_eq!(run.metrics.n_liquidated as usize, e.liquidated);
        assert_eq!(run.metrics.n_self_closed as usize, e.self_closed);
        assert_eq!(run.pnl.len(), 5000);
    }
}
