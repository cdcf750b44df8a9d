//! Protocol constants and unit conversions
//!
//! Months are 30 days throughout. Gas prices are quoted in gwei and stream
//! sizes are flow rates in quote currency per month.

/// Gas units consumed by a standard protocol transaction (open, close, liquidate)
pub const LIQUIDATION_GAS: f64 = 300_000.0;

/// Default gamma shape for stream sizes
pub const GAMMA_SHAPE: f64 = 4.0;

/// Shortest lookahead, in minutes, for which the predictive liquidator applies
pub const MIN_PREDICTION_MINUTES: f64 = 3.0;

pub const MINUTES_PER_HOUR: f64 = 60.0;
pub const MINUTES_PER_DAY: f64 = 24.0 * MINUTES_PER_HOUR;
pub const HOURS_PER_MONTH: f64 = 30.0 * 24.0;
pub const MINUTES_PER_MONTH: f64 = HOURS_PER_MONTH * MINUTES_PER_HOUR;

pub fn gwei_to_eth(gwei: f64) -> f64 {
    gwei * 1e-9
}

/// Per-month quantity expressed per hour
pub fn month_to_hour(x: f64) -> f64 {
    x / HOURS_PER_MONTH
}

/// Per-month quantity expressed per minute
pub fn month_to_minute(x: f64) -> f64 {
    x / MINUTES_PER_MONTH
}

/// Number of months spanned by a minute count
pub fn minute_to_month(minutes: f64) -> f64 {
    minutes / MINUTES_PER_MONTH
}

pub fn percent_to_dec(x: f64) -> f64 {
    x / 100.0
}

/// Margin posted by a stream of the given monthly rate, in quote currency
pub fn stream_rate_to_margin(stream_rate: f64, margin_hours: f64) -> f64 {
    month_to_hour(stream_rate) * margin_hours
}

/// Cost in quote currency of one standard transaction
pub fn transaction_cost(gas_price_gwei: f64, asset_price: f64) -> f64 {
    LIQUIDATION_GAS * gwei_to_eth(gas_price_gwei) * asset_price
}
