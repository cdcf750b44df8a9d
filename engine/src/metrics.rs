//! Scalar summary of a completed run
//!
//! Drawdowns are global peak-to-trough declines of the cumulative P&L. Ratio
//! metrics whose denominator is zero are reported as zero.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::binning::BinnedSeries;
use crate::error::{Result, SimulationError};
use crate::market::MarketSeries;
use crate::pnl::PnlSeries;

/// Largest peak-to-trough decline of a series
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Drawdown {
    /// `series[start] - series[end]`
    pub value: f64,
    /// Index of the peak preceding the trough
    pub start: usize,
    /// Index of the trough
    pub end: usize,
    /// `end - start`, in minutes
    pub duration: usize,
}

/// Global max drawdown of `values`
///
/// The trough is the first index with the largest deficit below the running
/// maximum; the peak is the first maximum before it.
pub fn max_drawdown(values: &[f64]) -> Drawdown {
    if values.is_empty() {
        return Drawdown::default();
    }

    let mut running_max = f64::NEG_INFINITY;
    let mut end = 0;
    let mut worst = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        running_max = running_max.max(v);
        let deficit = running_max - v;
        if deficit > worst {
            worst = deficit;
            end = i;
        }
    }

    let start = if end == 0 { 0 } else { argmax(&values[..end]) };

    Drawdown {
        value: values[start] - values[end],
        start,
        end,
        duration: end - start,
    }
}

/// Index of the first maximum
fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_i, best), (i, &v)| {
            if v > best {
                (i, v)
            } else {
                (best_i, best)
            }
        })
        .0
}

pub fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, &v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

/// `numerator / denominator`, or zero when the quotient is undefined
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Metric names in output column order
pub const METRIC_NAMES: [&str; 17] = [
    "liquidator_md",
    "liquidator_md_duration",
    "gas_tank_md",
    "gas_tank_md_duration",
    "liquidator_md_percent",
    "liquidator_md_duration_percent",
    "liquidator_profit",
    "gas_tank_profit",
    "total_profit",
    "liquidator_percent_of_profit",
    "n_opened",
    "n_liquidated",
    "n_self_closed",
    "percent_self_closed",
    "percent_closed",
    "total_margin_taken",
    "gas_tank_realized_pl",
];

/// Summary statistics of one simulation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub liquidator_md: f64,
    pub liquidator_md_duration: usize,
    pub gas_tank_md: f64,
    pub gas_tank_md_duration: usize,
    /// Liquidator share of the combined drawdown
    pub liquidator_md_percent: f64,
    /// Liquidator drawdown duration relative to the combined duration
    pub liquidator_md_duration_percent: f64,
    pub liquidator_profit: f64,
    /// Gas tank profit in quote currency, converted at the mean asset price
    pub gas_tank_profit: f64,
    pub total_profit: f64,
    pub liquidator_percent_of_profit: f64,
    pub n_opened: u64,
    pub n_liquidated: u64,
    pub n_self_closed: u64,
    pub percent_self_closed: f64,
    pub percent_closed: f64,
    /// Sum of liquidated stream sizes, one representative size per minute
    pub total_margin_taken: f64,
    /// Fees from streams that closed, net of refunds, in quote currency
    pub gas_tank_realized_pl: f64,
}

impl RunMetrics {
    /// Values in [`METRIC_NAMES`] order
    pub fn to_columns(&self) -> Vec<(&'static str, f64)> {
        let values = [
            self.liquidator_md,
            self.liquidator_md_duration as f64,
            self.gas_tank_md,
            self.gas_tank_md_duration as f64,
            self.liquidator_md_percent,
            self.liquidator_md_duration_percent,
            self.liquidator_profit,
            self.gas_tank_profit,
            self.total_profit,
            self.liquidator_percent_of_profit,
            self.n_opened as f64,
            self.n_liquidated as f64,
            self.n_self_closed as f64,
            self.percent_self_closed,
            self.percent_closed,
            self.total_margin_taken,
            self.gas_tank_realized_pl,
        ];
        METRIC_NAMES.iter().copied().zip(values).collect()
    }
}

/// Reduces the per-minute series of a run to [`RunMetrics`]
///
/// Binned and market series are cut to the P&L length, so minutes dropped by
/// the predictive window do not count. Either being shorter than the P&L is
/// an error.
pub fn extract_metrics(
    market: &MarketSeries,
    binned: &BinnedSeries,
    pnl: &PnlSeries,
    upfront_fee: f64,
) -> Result<RunMetrics> {
    let n = pnl.len();
    if market.len() < n {
        return Err(SimulationError::length_mismatch("market series", market.len(), "pnl series", n));
    }
    let columns = [
        ("n_opened", binned.n_opened.len()),
        ("n_liquidated", binned.n_liquidated.len()),
        ("n_self_closed", binned.n_self_closed.len()),
        ("avg_liquidation_size", binned.avg_liquidation_size.len()),
    ];
    if let Some((name, len)) = columns.into_iter().find(|(_, len)| *len < n) {
        return Err(SimulationError::length_mismatch(name, len, "pnl series", n));
    }

    let mean_price = if n == 0 { 0.0 } else { market.price()[..n].iter().mean() };

    let liquidator_cumsum = cumulative_sum(&pnl.liquidator_pl);
    let gas_tank_cumsum: Vec<f64> = cumulative_sum(&pnl.gas_tank_eth_pl)
        .into_iter()
        .map(|v| v * mean_price)
        .collect();

    let liquidator_profit = liquidator_cumsum.last().copied().unwrap_or(0.0);
    let gas_tank_profit = gas_tank_cumsum.last().copied().unwrap_or(0.0);
    let total_profit = liquidator_profit + gas_tank_profit;

    let liquidator_md = max_drawdown(&liquidator_cumsum);
    let gas_tank_md = max_drawdown(&gas_tank_cumsum);

    let sum = |counts: &[u32]| counts[..n].iter().map(|&c| c as u64).sum::<u64>();
    let n_opened = sum(&binned.n_opened);
    let n_liquidated = sum(&binned.n_liquidated);
    let n_self_closed = sum(&binned.n_self_closed);
    let n_closed = n_liquidated + n_self_closed;

    let total_margin_taken = binned.n_liquidated[..n]
        .iter()
        .zip(&binned.avg_liquidation_size)
        .map(|(&c, &size)| c as f64 * size)
        .sum();
    let refunded: f64 = pnl.gas_refunded_eth.iter().sum();

    Ok(RunMetrics {
        liquidator_md: liquidator_md.value,
        liquidator_md_duration: liquidator_md.duration,
        gas_tank_md: gas_tank_md.value,
        gas_tank_md_duration: gas_tank_md.duration,
        liquidator_md_percent: safe_ratio(liquidator_md.value, liquidator_md.value + gas_tank_md.value),
        liquidator_md_duration_percent: safe_ratio(
            liquidator_md.duration as f64,
            (liquidator_md.duration + gas_tank_md.duration) as f64,
        ),
        liquidator_profit,
        gas_tank_profit,
        total_profit,
        liquidator_percent_of_profit: safe_ratio(liquidator_profit, total_profit),
        n_opened,
        n_liquidated,
        n_self_closed,
        percent_self_closed: safe_ratio(n_self_closed as f64, n_closed as f64),
        percent_closed: safe_ratio(n_closed as f64, n_opened as f64),
        total_margin_taken,
        gas_tank_realized_pl: (n_closed as f64 * upfront_fee - refunded) * mean_price,
    })
}
