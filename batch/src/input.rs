//! Market data loading from CSV
//!
//! Expects a header row. `price` and `median_gas_price` are required;
//! `gas_price`, `three_min_median` and a `time` or `date` column are
//! optional. Unnamed index columns are ignored.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use streamsim_engine::MarketSeries;

use crate::error::{BatchError, Result};

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

/// Load a market series from a CSV file
pub fn load_market_csv<P: AsRef<Path>>(path: P) -> Result<MarketSeries> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let market = parse_market_csv(&content)?;
    info!(path = %path.display(), minutes = market.len(), "Loaded market data");
    Ok(market)
}

/// Parse a timestamp in one of the accepted layouts
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

struct Columns {
    price: usize,
    median_gas_price: usize,
    gas_price: Option<usize>,
    three_min_median: Option<usize>,
    time: Option<usize>,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self> {
        let names: Vec<&str> = header.split(',').map(|h| h.trim().trim_matches('"')).collect();
        let find = |name: &str| names.iter().position(|h| *h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| BatchError::input(1, format!("missing required column '{}'", name)))
        };

        let ignored = names.iter().filter(|h| h.is_empty() || h.starts_with("Unnamed")).count();
        if ignored > 0 {
            debug!(ignored, "Dropping index columns");
        }

        Ok(Self {
            price: require("price")?,
            median_gas_price: require("median_gas_price")?,
            gas_price: find("gas_price"),
            three_min_median: find("three_min_median"),
            time: find("time").or_else(|| find("date")),
        })
    }
}

/// Parse CSV text into a market series
pub fn parse_market_csv(content: &str) -> Result<MarketSeries> {
    let mut lines = content.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
    let (_, header) = lines
        .next()
        .ok_or_else(|| BatchError::input(1, "input is empty"))?;
    let columns = Columns::from_header(header)?;

    let mut gas_price = Vec::new();
    let mut median_gas_price = Vec::new();
    let mut price = Vec::new();
    let mut three_min_median = columns.three_min_median.map(|_| Vec::new());
    let mut last_time: Option<NaiveDateTime> = None;

    for (i, line) in lines {
        let line_no = i + 1;
        let fields: Vec<&str> = line.split(',').map(|f| f.trim().trim_matches('"')).collect();
        let number = |idx: usize, name: &str| -> Result<f64> {
            let raw = fields
                .get(idx)
                .ok_or_else(|| BatchError::input(line_no, format!("missing field '{}'", name)))?;
            raw.parse::<f64>()
                .map_err(|e| BatchError::input(line_no, format!("bad {} '{}': {}", name, raw, e)))
        };

        let median = number(columns.median_gas_price, "median_gas_price")?;
        median_gas_price.push(median);
        price.push(number(columns.price, "price")?);
        gas_price.push(match columns.gas_price {
            Some(idx) => number(idx, "gas_price")?,
            None => median,
        });
        if let (Some(idx), Some(column)) = (columns.three_min_median, three_min_median.as_mut()) {
            column.push(number(idx, "three_min_median")?);
        }

        if let Some(idx) = columns.time {
            let raw = fields.get(idx).copied().unwrap_or_default();
            let time = parse_timestamp(raw)
                .ok_or_else(|| BatchError::input(line_no, format!("unparseable timestamp '{}'", raw)))?;
            if last_time.map_or(false, |prev| time <= prev) {
                return Err(BatchError::input(line_no, "timestamps must be strictly increasing"));
            }
            last_time = Some(time);
        }
    }

    Ok(MarketSeries::new(gas_price, median_gas_price, price, three_min_median)?)
}
