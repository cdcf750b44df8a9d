//! Per-minute market observations consumed by the simulation

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};

/// Column-oriented market series indexed by minute
///
/// Read-only once built; every simulation stage borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSeries {
    gas_price: Vec<f64>,
    median_gas_price: Vec<f64>,
    price: Vec<f64>,
    three_min_median: Option<Vec<f64>>,
}

impl MarketSeries {
    /// Build a series from columns, checking lengths and values
    pub fn new(
        gas_price: Vec<f64>,
        median_gas_price: Vec<f64>,
        price: Vec<f64>,
        three_min_median: Option<Vec<f64>>,
    ) -> Result<Self> {
        let n = price.len();
        if n == 0 {
            return Err(SimulationError::invalid_series("series must contain at least one minute"));
        }

        check_column("gas_price", &gas_price, n)?;
        check_column("median_gas_price", &median_gas_price, n)?;
        check_column("price", &price, n)?;
        if let Some(column) = &three_min_median {
            check_column("three_min_median", column, n)?;
        }

        Ok(Self {
            gas_price,
            median_gas_price,
            price,
            three_min_median,
        })
    }

    /// A flat market where every gas column equals `gas_price` and the asset trades at `price`
    pub fn constant(n_minutes: usize, gas_price: f64, price: f64) -> Result<Self> {
        Self::new(
            vec![gas_price; n_minutes],
            vec![gas_price; n_minutes],
            vec![price; n_minutes],
            Some(vec![gas_price; n_minutes]),
        )
    }

    /// Number of minutes in the series
    pub fn len(&self) -> usize {
        self.price.len()
    }

    pub fn is_empty(&self) -> bool {
        self.price.is_empty()
    }

    pub fn gas_price(&self) -> &[f64] {
        &self.gas_price
    }

    pub fn median_gas_price(&self) -> &[f64] {
        &self.median_gas_price
    }

    pub fn price(&self) -> &[f64] {
        &self.price
    }

    /// Three-minute median gas column, required by the predictive liquidator
    pub fn three_min_median(&self) -> Result<&[f64]> {
        self.three_min_median
            .as_deref()
            .ok_or_else(|| SimulationError::MissingColumn("three_min_median".to_string()))
    }
}

fn check_column(name: &str, column: &[f64], expected: usize) -> Result<()> {
    if column.len() != expected {
        return Err(SimulationError::length_mismatch(name, column.len(), "price", expected));
    }
    if let Some(i) = column.iter().position(|v| !v.is_finite()) {
        return Err(SimulationError::invalid_series(format!(
            "{} has a non-finite value at minute {}",
            name, i
        )));
    }
    Ok(())
}
