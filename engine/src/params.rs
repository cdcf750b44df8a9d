//! Economic parameters for one simulation draw

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::units::{percent_to_dec, month_to_minute, GAMMA_SHAPE, MINUTES_PER_DAY};

/// Parameter names in output column order
pub const PARAMETER_NAMES: [&str; 11] = [
    "upfront_fee",
    "monthly_opened_streams",
    "average_stream_lifetime",
    "percent_accidentally_liquidated_per_month",
    "average_stream_size",
    "upfront_hours",
    "refund_rate",
    "min_self_liquidation_savings",
    "gas_prediction_ability",
    "lowest_stream_cost_ratio",
    "stream_size_shape",
];

/// Parameters consumed by the event simulator and the P&L engine
///
/// Construct through [`SimulationParams::from_map`] or build the struct and
/// call [`SimulationParams::validate`]; the simulation validates again before
/// running.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Fee paid into the gas tank per opened stream (native asset)
    pub upfront_fee: f64,

    /// Expected stream openings per 30-day month
    pub monthly_opened_streams: f64,

    /// Mean stream lifetime before a self-close (days)
    pub average_stream_lifetime: f64,

    /// Share of open streams liquidated by accident each month (percent)
    pub percent_accidentally_liquidated_per_month: f64,

    /// Mean stream flow rate (quote currency per month)
    pub average_stream_size: f64,

    /// Margin posted upfront, in hours of flow
    pub upfront_hours: f64,

    /// Share of liquidation gas refunded by the gas tank
    pub refund_rate: f64,

    /// Premium a user needs before bothering to self-close (quote currency)
    pub min_self_liquidation_savings: f64,

    /// Hours of perfect gas-price foresight the liquidator has
    pub gas_prediction_ability: f64,

    /// Minimum monthly flow / opening cost ratio a user opens under.
    /// `None` disables the open-viability filter.
    #[serde(default)]
    pub lowest_stream_cost_ratio: Option<f64>,

    /// Gamma shape of the stream size distribution
    #[serde(default = "default_stream_size_shape")]
    pub stream_size_shape: f64,
}

fn default_stream_size_shape() -> f64 {
    GAMMA_SHAPE
}

impl SimulationParams {
    /// Build parameters from a flat name/value mapping
    ///
    /// Every required name must be present and no unrecognized name may appear.
    /// `lowest_stream_cost_ratio` and `stream_size_shape` are optional.
    pub fn from_map(values: &HashMap<String, f64>) -> Result<Self> {
        if let Some(unknown) = values.keys().find(|k| !PARAMETER_NAMES.contains(&k.as_str())) {
            return Err(SimulationError::UnknownParameter(unknown.clone()));
        }

        let required = |name: &str| -> Result<f64> {
            values
                .get(name)
                .copied()
                .ok_or_else(|| SimulationError::MissingParameter(name.to_string()))
        };

        let params = Self {
            upfront_fee: required("upfront_fee")?,
            monthly_opened_streams: required("monthly_opened_streams")?,
            average_stream_lifetime: required("average_stream_lifetime")?,
            percent_accidentally_liquidated_per_month: required(
                "percent_accidentally_liquidated_per_month",
            )?,
            average_stream_size: required("average_stream_size")?,
            upfront_hours: required("upfront_hours")?,
            refund_rate: required("refund_rate")?,
            min_self_liquidation_savings: required("min_self_liquidation_savings")?,
            gas_prediction_ability: required("gas_prediction_ability")?,
            lowest_stream_cost_ratio: values.get("lowest_stream_cost_ratio").copied(),
            stream_size_shape: values
                .get("stream_size_shape")
                .copied()
                .unwrap_or(GAMMA_SHAPE),
        };

        params.validate()?;
        Ok(params)
    }

    /// Check every parameter against its valid range
    pub fn validate(&self) -> Result<()> {
        non_negative("upfront_fee", self.upfront_fee)?;
        non_negative("monthly_opened_streams", self.monthly_opened_streams)?;
        positive("average_stream_lifetime", self.average_stream_lifetime)?;
        non_negative(
            "percent_accidentally_liquidated_per_month",
            self.percent_accidentally_liquidated_per_month,
        )?;
        positive("average_stream_size", self.average_stream_size)?;
        non_negative("upfront_hours", self.upfront_hours)?;
        non_negative("min_self_liquidation_savings", self.min_self_liquidation_savings)?;
        non_negative("gas_prediction_ability", self.gas_prediction_ability)?;
        positive("stream_size_shape", self.stream_size_shape)?;

        if !(0.0..=1.0).contains(&self.refund_rate) {
            return Err(SimulationError::invalid_parameter(
                "refund_rate",
                format!("{} is outside [0, 1]", self.refund_rate),
            ));
        }
        if let Some(ratio) = self.lowest_stream_cost_ratio {
            positive("lowest_stream_cost_ratio", ratio)?;
        }

        Ok(())
    }

    /// Copy with a different refund rate
    pub fn with_refund_rate(&self, refund_rate: f64) -> Self {
        Self {
            refund_rate,
            ..*self
        }
    }

    /// Per-minute hazard of a user closing their own stream
    pub fn prob_self_closed(&self) -> f64 {
        1.0 / (self.average_stream_lifetime * MINUTES_PER_DAY)
    }

    /// Per-minute hazard of an accidental liquidation
    pub fn prob_liquidated(&self) -> f64 {
        percent_to_dec(month_to_minute(self.percent_accidentally_liquidated_per_month))
    }

    /// Values in [`PARAMETER_NAMES`] order. An unset cost ratio is reported as NaN.
    pub fn to_columns(&self) -> Vec<(&'static str, f64)> {
        let values = [
            self.upfront_fee,
            self.monthly_opened_streams,
            self.average_stream_lifetime,
            self.percent_accidentally_liquidated_per_month,
            self.average_stream_size,
            self.upfront_hours,
            self.refund_rate,
            self.min_self_liquidation_savings,
            self.gas_prediction_ability,
            self.lowest_stream_cost_ratio.unwrap_or(f64::NAN),
            self.stream_size_shape,
        ];
        PARAMETER_NAMES.iter().copied().zip(values).collect()
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimulationError::invalid_parameter(name, format!("{} must be >= 0", value)))
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimulationError::invalid_parameter(name, format!("{} must be > 0", value)))
    }
}
