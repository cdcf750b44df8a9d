//! Per-minute aggregation of event arrivals
//!
//! When several events share a minute the count is exact, but the recorded
//! size is that of the first event seen at the minute, not an average.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::events::StreamEvents;

/// Counts and, when sizes were supplied, a representative size per minute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binned {
    pub counts: Vec<u32>,
    pub sizes: Option<Vec<f64>>,
}

/// Bin event times (and optionally sizes) into `n_minutes` one-minute buckets
pub fn bin_events(times: &[usize], sizes: Option<&[f64]>, n_minutes: usize) -> Result<Binned> {
    if let Some(sizes) = sizes {
        if sizes.len() != times.len() {
            return Err(SimulationError::length_mismatch("sizes", sizes.len(), "times", times.len()));
        }
    }

    let mut counts = vec![0u32; n_minutes];
    let mut binned_sizes = sizes.map(|_| vec![0.0; n_minutes]);

    for (i, &t) in times.iter().enumerate() {
        if t >= n_minutes {
            return Err(SimulationError::EventOutOfRange { time: t, n_minutes });
        }
        if counts[t] == 0 {
            if let (Some(binned), Some(sizes)) = (binned_sizes.as_mut(), sizes) {
                binned[t] = sizes[i];
            }
        }
        counts[t] += 1;
    }

    Ok(Binned {
        counts,
        sizes: binned_sizes,
    })
}

/// Bin event times without sizes
pub fn bin_counts(times: &[usize], n_minutes: usize) -> Result<Vec<u32>> {
    Ok(bin_events(times, None, n_minutes)?.counts)
}

/// Inverse of [`bin_counts`]: each minute index repeated `count` times
pub fn expand_counts(counts: &[u32]) -> Vec<usize> {
    counts
        .iter()
        .enumerate()
        .flat_map(|(t, &c)| std::iter::repeat(t).take(c as usize))
        .collect()
}

/// Per-minute view of a run's stream events, aligned with the market series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedSeries {
    pub n_opened: Vec<u32>,
    pub n_liquidated: Vec<u32>,
    pub n_self_closed: Vec<u32>,
    pub avg_liquidation_size: Vec<f64>,
    pub avg_self_closed_size: Vec<f64>,
}

impl BinnedSeries {
    pub fn from_events(events: &StreamEvents, n_minutes: usize) -> Result<Self> {
        let n_opened = bin_counts(&events.opened.times, n_minutes)?;
        let liquidated = bin_events(&events.liquidated.times, Some(&events.liquidated.sizes), n_minutes)?;
        let self_closed = bin_events(&events.self_closed.times, Some(&events.self_closed.sizes), n_minutes)?;

        Ok(Self {
            n_opened,
            n_liquidated: liquidated.counts,
            n_self_closed: self_closed.counts,
            avg_liquidation_size: liquidated.sizes.unwrap_or_else(|| vec![0.0; n_minutes]),
            avg_self_closed_size: self_closed.sizes.unwrap_or_else(|| vec![0.0; n_minutes]),
        })
    }

    pub fn len(&self) -> usize {
        self.n_opened.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_opened.is_empty()
    }

    /// Number of streams open at the end of each minute
    pub fn open_streams(&self) -> Vec<i64> {
        let mut open = 0i64;
        self.n_opened
            .iter()
            .zip(&self.n_liquidated)
            .zip(&self.n_self_closed)
            .map(|((&o, &l), &s)| {
                open += o as i64 - l as i64 - s as i64;
                open
            })
            .collect()
    }
}
