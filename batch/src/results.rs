//! Result tables: one row per draw, parameters then metrics

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use streamsim_engine::{RunMetrics, SimulationParams, METRIC_NAMES, PARAMETER_NAMES};

use crate::error::Result;

/// Outcome of a single Monte-Carlo draw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Draw index within the worker
    pub draw: usize,

    /// Seed the draw's simulation ran with
    pub seed: u64,

    /// Whether any step of the draw fell back
    pub failed: bool,

    /// Parameters the draw ran with, if sampling succeeded
    pub params: Option<SimulationParams>,

    /// Metrics, absent when the simulation itself failed
    pub metrics: Option<RunMetrics>,
}

impl ResultRow {
    pub fn header() -> String {
        let mut columns = vec!["draw", "seed", "failed"];
        columns.extend(PARAMETER_NAMES);
        columns.extend(METRIC_NAMES);
        columns.join(",")
    }

    /// One CSV line; missing and NaN values are left empty
    pub fn to_csv(&self) -> String {
        let mut line = format!("{},{},{}", self.draw, self.seed, self.failed);

        match &self.params {
            Some(params) => params.to_columns().iter().for_each(|(_, v)| push_value(&mut line, *v)),
            None => PARAMETER_NAMES.iter().for_each(|_| line.push(',')),
        }
        match &self.metrics {
            Some(metrics) => metrics.to_columns().iter().for_each(|(_, v)| push_value(&mut line, *v)),
            None => METRIC_NAMES.iter().for_each(|_| line.push(',')),
        }

        line
    }
}

fn push_value(line: &mut String, value: f64) {
    line.push(',');
    if value.is_finite() {
        let _ = write!(line, "{}", value);
    }
}

/// Rows collected by one worker batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn push(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.rows.iter().filter(|r| r.failed).count()
    }

    pub fn to_csv(&self) -> String {
        let mut csv = ResultRow::header();
        csv.push('\n');
        for row in &self.rows {
            csv.push_str(&row.to_csv());
            csv.push('\n');
        }
        csv
    }

    /// Write the table under `dir`, creating it if needed
    pub fn write_to(&self, dir: &Path, file_name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        std::fs::write(&path, self.to_csv())?;
        Ok(path)
    }
}

/// File name for a worker batch: `<unix_ts>_w<worker>_b<batch>.csv`
pub fn batch_file_name(timestamp: i64, worker: usize, batch: usize) -> String {
    format!("{}_w{}_b{}.csv", timestamp, worker, batch)
}
