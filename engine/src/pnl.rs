//! Liquidator and gas tank profit & loss per minute
//!
//! A naive liquidator executes every liquidation in the minute it appears,
//! at the median gas price. A liquidator with gas-price foresight picks the
//! minute in its lookahead window that maximizes remaining margin minus
//! execution cost. The gas tank collects upfront fees on opens and refunds
//! a share of the gas actually paid for liquidations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binning::BinnedSeries;
use crate::error::{Result, SimulationError};
use crate::market::MarketSeries;
use crate::params::SimulationParams;
use crate::units::{
    gwei_to_eth, month_to_minute, stream_rate_to_margin, transaction_cost, LIQUIDATION_GAS,
    MINUTES_PER_HOUR, MIN_PREDICTION_MINUTES,
};

/// How the liquidator times its executions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidatorMode {
    /// Execute immediately at the median gas price
    Naive,

    /// Execute at the best minute within the next `window` minutes
    Predictive { lookahead_minutes: usize, window: usize },
}

impl LiquidatorMode {
    /// Select the mode for a given foresight in hours
    ///
    /// Foresight up to and including three minutes is treated as none.
    pub fn from_prediction_ability(hours: f64) -> Self {
        if hours <= MIN_PREDICTION_MINUTES / MINUTES_PER_HOUR {
            return LiquidatorMode::Naive;
        }
        let lookahead_minutes = (hours * MINUTES_PER_HOUR).floor() as usize;
        LiquidatorMode::Predictive {
            lookahead_minutes,
            window: lookahead_minutes.saturating_sub(2).max(1),
        }
    }

    /// Number of output minutes for a series of `n_minutes`
    ///
    /// Predictive output stops where a full window no longer fits.
    pub fn output_len(&self, n_minutes: usize) -> usize {
        match *self {
            LiquidatorMode::Naive => n_minutes,
            LiquidatorMode::Predictive { window, .. } => {
                if window > n_minutes {
                    0
                } else {
                    n_minutes - window + 1
                }
            }
        }
    }
}

/// Best execution offset within a window of future gas prices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Execution {
    /// Minutes after the liquidation became available
    pub offset: usize,

    /// Gas price at the chosen minute (gwei)
    pub gas_price: f64,

    /// Remaining margin minus unrefunded gas cost at the chosen minute
    pub profit: f64,
}

/// Pick the execution minute maximizing remaining margin minus gas cost
///
/// Margin erodes by `erosion_per_minute` for every minute of delay. Ties go to
/// the earliest minute. An empty window yields `None`.
pub fn best_execution(
    margin: f64,
    erosion_per_minute: f64,
    gas_window: &[f64],
    asset_price: f64,
    refund_rate: f64,
) -> Option<Execution> {
    gas_window
        .iter()
        .enumerate()
        .map(|(offset, &gas_price)| Execution {
            offset,
            gas_price,
            profit: margin
                - offset as f64 * erosion_per_minute
                - transaction_cost(gas_price, asset_price) * (1.0 - refund_rate),
        })
        .fold(None, |best: Option<Execution>, candidate| match best {
            Some(b) if b.profit >= candidate.profit => Some(b),
            _ => Some(candidate),
        })
}

/// Per-minute P&L of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlSeries {
    pub mode: LiquidatorMode,

    /// Liquidator P&L in quote currency
    pub liquidator_pl: Vec<f64>,

    /// Gas price the liquidations were executed at (gwei)
    pub gas_price_paid: Vec<f64>,

    /// Gas refunded by the tank (native asset)
    pub gas_refunded_eth: Vec<f64>,

    /// Gas tank P&L (native asset)
    pub gas_tank_eth_pl: Vec<f64>,

    /// Gas tank P&L converted at the minute's asset price
    pub gas_tank_usd_pl: Vec<f64>,
}

impl PnlSeries {
    pub fn len(&self) -> usize {
        self.liquidator_pl.len()
    }

    pub fn is_empty(&self) -> bool {
        self.liquidator_pl.is_empty()
    }
}

/// Liquidator P&L with immediate execution at the median gas price
pub fn naive_liquidator_pl(
    market: &MarketSeries,
    binned: &BinnedSeries,
    params: &SimulationParams,
) -> Vec<f64> {
    binned
        .n_liquidated
        .iter()
        .zip(&binned.avg_liquidation_size)
        .zip(market.median_gas_price().iter().zip(market.price()))
        .map(|((&n, &size), (&gas, &price))| {
            let n = n as f64;
            n * stream_rate_to_margin(size, params.upfront_hours)
                - LIQUIDATION_GAS * n * gwei_to_eth(gas) * price * (1.0 - params.refund_rate)
        })
        .collect()
}

/// Liquidator P&L and gas paid with optimal execution inside `window` minutes
///
/// Only minutes with liquidations are searched. Output is truncated to
/// [`LiquidatorMode::output_len`].
pub fn predictive_liquidator_pl(
    market: &MarketSeries,
    binned: &BinnedSeries,
    params: &SimulationParams,
    window: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let gas = market.three_min_median()?;
    let prices = market.price();
    if window == 0 {
        return Err(SimulationError::invalid_parameter(
            "gas_prediction_ability",
            "prediction window must cover at least one minute",
        ));
    }
    let rows = if window > gas.len() { 0 } else { gas.len() - window + 1 };

    let mut liquidator_pl = vec![0.0; rows];
    let mut gas_price_paid = vec![0.0; rows];

    for t in (0..rows).filter(|&t| binned.n_liquidated[t] > 0) {
        let size = binned.avg_liquidation_size[t];
        let execution = best_execution(
            stream_rate_to_margin(size, params.upfront_hours),
            month_to_minute(size),
            &gas[t..t + window],
            prices[t],
            params.refund_rate,
        );
        if let Some(execution) = execution {
            liquidator_pl[t] = binned.n_liquidated[t] as f64 * execution.profit;
            gas_price_paid[t] = execution.gas_price;
        }
    }

    Ok((liquidator_pl, gas_price_paid))
}

/// Computes per-minute P&L for the liquidator and the gas tank
pub struct PnlEngine<'a> {
    market: &'a MarketSeries,
    params: &'a SimulationParams,
}

impl<'a> PnlEngine<'a> {
    pub fn new(market: &'a MarketSeries, params: &'a SimulationParams) -> Self {
        Self { market, params }
    }

    pub fn mode(&self) -> LiquidatorMode {
        LiquidatorMode::from_prediction_ability(self.params.gas_prediction_ability)
    }

    pub fn compute(&self, binned: &BinnedSeries) -> Result<PnlSeries> {
        if binned.len() != self.market.len() {
            return Err(SimulationError::length_mismatch(
                "binned series",
                binned.len(),
                "market series",
                self.market.len(),
            ));
        }

        let mode = self.mode();
        let (liquidator_pl, gas_price_paid) = match mode {
            LiquidatorMode::Naive => (
                naive_liquidator_pl(self.market, binned, self.params),
                self.market.median_gas_price().to_vec(),
            ),
            LiquidatorMode::Predictive { window, .. } => {
                predictive_liquidator_pl(self.market, binned, self.params, window)?
            }
        };

        let n = liquidator_pl.len();
        let refund_rate = self.params.refund_rate;
        let gas_refunded_eth: Vec<f64> = binned.n_liquidated[..n]
            .iter()
            .zip(&gas_price_paid)
            .map(|(&l, &gas)| LIQUIDATION_GAS * l as f64 * gwei_to_eth(gas) * refund_rate)
            .collect();
        let gas_tank_eth_pl: Vec<f64> = binned.n_opened[..n]
            .iter()
            .zip(&gas_refunded_eth)
            .map(|(&o, &refunded)| o as f64 * self.params.upfront_fee - refunded)
            .collect();
        let gas_tank_usd_pl = gas_tank_eth_pl
            .iter()
            .zip(self.market.price())
            .map(|(&eth, &price)| eth * price)
            .collect();

        debug!(?mode, minutes = n, "Computed P&L series");

        Ok(PnlSeries {
            mode,
            liquidator_pl,
            gas_price_paid,
            gas_refunded_eth,
            gas_tank_eth_pl,
            gas_tank_usd_pl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(gas_prediction_ability: f64) -> SimulationParams {
        SimulationParams {
            upfront_fee: 0.01,
            monthly_opened_streams: 1000.0,
            average_stream_lifetime: 30.0,
            percent_accidentally_liquidated_per_month: 5.0,
            average_stream_size: 720.0,
            upfront_hours: 10.0,
            refund_rate: 0.5,
            min_self_liquidation_savings: 5.0,
            gas_prediction_ability,
            lowest_stream_cost_ratio: None,
            stream_size_shape: 4.0,
        }
    }

    fn binned(n: usize, liquidations: &[(usize, u32, f64)], opens: &[(usize, u32)]) -> BinnedSeries {
        let mut b = BinnedSeries {
            n_opened: vec![0; n],
            n_liquidated: vec![0; n],
            n_self_closed: vec![0; n],
            avg_liquidation_size: vec![0.0; n],
            avg_self_closed_size: vec![0.0; n],
        };
        for &(t, count, size) in liquidations {
            b.n_liquidated[t] = count;
            b.avg_liquidation_size[t] = size;
        }
        for &(t, count) in opens {
            b.n_opened[t] = count;
        }
        b
    }

    #[test]
    fn test_three_minutes_routes_to_naive() {
        assert_eq!(LiquidatorMode::from_prediction_ability(3.0 / 60.0), LiquidatorMode::Naive);
        assert_eq!(LiquidatorMode::from_prediction_ability(0.0), LiquidatorMode::Naive);
        assert!(matches!(
            LiquidatorMode::from_prediction_ability(4.0 / 60.0),
            LiquidatorMode::Predictive { .. }
        ));
    }

    #[test]
    fn test_predictive_window_size() {
        let mode = LiquidatorMode::from_prediction_ability(1.0);
        assert_eq!(mode, LiquidatorMode::Predictive { lookahead_minutes: 60, window: 58 });
        assert_eq!(mode.output_len(100), 43);
        assert_eq!(mode.output_len(10), 0);
    }

    #[test]
    fn test_decreasing_gas_picks_last_minute() {
        // margin 10, erosion tiny next to the gas savings per minute
        let gas = [100.0, 80.0, 60.0, 40.0, 20.0];
        let best = best_execution(10.0, 1e-6, &gas, 1.0, 0.0).unwrap();
        assert_eq!(best.offset, 4);
        assert_eq!(best.gas_price, 20.0);
    }

    #[test]
    fn test_flat_gas_executes_immediately() {
        let gas = [50.0; 6];
        let best = best_execution(10.0, 0.1, &gas, 1.0, 0.0).unwrap();
        assert_eq!(best.offset, 0);
    }

    #[test]
    fn test_empty_window_has_no_execution() {
        assert!(best_execution(10.0, 0.1, &[], 1.0, 0.0).is_none());
    }

    #[test]
    fn test_naive_pl() {
        let market = MarketSeries::constant(3, 100.0, 2000.0).unwrap();
        // size 720/month is 1/hour, 10 hours of margin
        let b = binned(3, &[(1, 2, 720.0)], &[(0, 3)]);
        let p = params(0.0);
        let pnl = PnlEngine::new(&market, &p).compute(&b).unwrap();

        // gas per liquidation = 0.03 native * 2000 = 60, half refunded
        assert_eq!(pnl.mode, LiquidatorMode::Naive);
        assert!((pnl.liquidator_pl[1] - (2.0 * 10.0 - 2.0 * 30.0)).abs() < 1e-9);
        assert_eq!(pnl.liquidator_pl[0], 0.0);
        assert!((pnl.gas_refunded_eth[1] - 0.03).abs() < 1e-12);
        assert!((pnl.gas_tank_eth_pl[0] - 0.03).abs() < 1e-12);
        assert!((pnl.gas_tank_eth_pl[1] + 0.03).abs() < 1e-12);
        assert!((pnl.gas_tank_usd_pl[1] + 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_predictive_uses_cheapest_gas_and_truncates() {
        let n = 20;
        let falling: Vec<f64> = (0..n).map(|i| 100.0 - i as f64).collect();
        let market = MarketSeries::new(
            vec![100.0; n],
            vec![100.0; n],
            vec![2000.0; n],
            Some(falling),
        )
        .unwrap();
        let b = binned(n, &[(2, 1, 720.0)], &[]);
        // 15 minutes of lookahead, window of 13
        let p = params(0.25);
        let pnl = PnlEngine::new(&market, &p).compute(&b).unwrap();

        assert_eq!(pnl.len(), n - 13 + 1);
        // each minute of delay saves 0.3 in gas and loses ~0.017 of margin
        assert_eq!(pnl.gas_price_paid[2], 86.0);
        assert_eq!(pnl.gas_price_paid[3], 0.0);
        assert!((pnl.gas_refunded_eth[2] - LIQUIDATION_GAS * 86e-9 * 0.5).abs() < 1e-15);
        let expected = 10.0 - 12.0 * 720.0 / 43_200.0 - LIQUIDATION_GAS * 86e-9 * 2000.0 * 0.5;
        assert!((pnl.liquidator_pl[2] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_predictive_requires_three_min_median() {
        let market = MarketSeries::new(vec![1.0; 10], vec![1.0; 10], vec![1.0; 10], None).unwrap();
        let b = binned(10, &[], &[]);
        let p = params(0.5);
        let err = PnlEngine::new(&market, &p).compute(&b).unwrap_err();
        assert!(matches!(err, SimulationError::MissingColumn(_)));
    }

    #[test]
    fn test_predictive_window_longer_than_series() {
        let market = MarketSeries::constant(30, 1.0, 1.0).unwrap();
        let b = binned(30, &[(29, 1, 720.0)], &[(0, 1)]);
        let p = params(2.0);
        let pnl = PnlEngine::new(&market, &p).compute(&b).unwrap();
        assert!(pnl.is_empty());
    }
}
