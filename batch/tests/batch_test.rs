//! End-to-end batch runs over a small synthetic market

use std::path::PathBuf;

use streamsim_batch::{
    load_market_csv, BatchConfig, BatchError, BatchRunner, ParameterSampler, RangeSampler,
    RefundCalibrator, Result, REFUND_RATE_BRACKET,
};
use streamsim_engine::{MarketSeries, SimRng, SimulationParams, METRIC_NAMES, PARAMETER_NAMES};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("streamsim_batch_test_{}", name));
    std::fs::remove_dir_all(&dir).ok();
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_market(dir: &PathBuf, minutes: usize) -> PathBuf {
    let mut csv = String::from(",time,price,median_gas_price,three_min_median\n");
    for i in 0..minutes {
        let gas = 40.0 + (i % 30) as f64;
        csv.push_str(&format!(
            "{},2021-05-01 {:02}:{:02}:00,2500,{},{}\n",
            i,
            i / 60,
            i % 60,
            gas,
            gas - 1.0
        ));
    }
    let path = dir.join("market.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn config_for(dir: &PathBuf) -> BatchConfig {
    let mut config = BatchConfig::default();
    config.input.path = write_market(dir, 600).to_string_lossy().into_owned();
    config.output.dir = dir.join("out").to_string_lossy().into_owned();
    config.run.workers = 2;
    config.run.batches_per_worker = 2;
    config.run.draws_per_batch = 4;
    config.run.base_seed = 11;
    config.run.calibrate_refund_rate = false;
    config
}

fn read_rows(files: &[PathBuf]) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for file in files {
        let content = std::fs::read_to_string(file).unwrap();
        for line in content.lines().skip(1) {
            rows.push(line.split(',').map(str::to_string).collect());
        }
    }
    rows
}

struct FailingSampler;

impl ParameterSampler for FailingSampler {
    fn sample(&self, _rng: &mut dyn SimRng) -> Result<SimulationParams> {
        Err(BatchError::internal("no parameters"))
    }
}

struct FixedSampler(SimulationParams);

impl ParameterSampler for FixedSampler {
    fn sample(&self, _rng: &mut dyn SimRng) -> Result<SimulationParams> {
        Ok(self.0)
    }
}

/// Busy stream population with frequent accidental liquidations
fn busy_params() -> SimulationParams {
    SimulationParams {
        upfront_fee: 0.01,
        monthly_opened_streams: 50_000.0,
        average_stream_lifetime: 1.0,
        percent_accidentally_liquidated_per_month: 60.0,
        average_stream_size: 3000.0,
        upfront_hours: 10.0,
        refund_rate: 0.5,
        min_self_liquidation_savings: 5.0,
        gas_prediction_ability: 0.0,
        lowest_stream_cost_ratio: None,
        stream_size_shape: 4.0,
    }
}

#[test]
fn test_batch_run_writes_every_draw() {
    let dir = scratch_dir("every_draw");
    let config = config_for(&dir);
    let market = load_market_csv(&config.input.path).unwrap();
    assert_eq!(market.len(), 600);

    let runner = BatchRunner::new(&config, &market, RangeSampler::new(config.parameters.clone()));
    let summary = runner.run().unwrap();

    assert_eq!(summary.draws, 16);
    assert_eq!(summary.files.len(), 4);

    let rows = read_rows(&summary.files);
    let width = 3 + PARAMETER_NAMES.len() + METRIC_NAMES.len();
    assert_eq!(rows.len(), 16);
    assert!(rows.iter().all(|r| r.len() == width));

    // gas_prediction_ability is pinned to zero by default
    let idx = 3 + PARAMETER_NAMES
        .iter()
        .position(|n| *n == "gas_prediction_ability")
        .unwrap();
    assert!(rows.iter().all(|r| r[idx] == "0"));

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_failed_sampling_is_recorded_not_fatal() {
    let dir = scratch_dir("failed_sampling");
    let config = config_for(&dir);
    let market = load_market_csv(&config.input.path).unwrap();

    let summary = BatchRunner::new(&config, &market, FailingSampler).run().unwrap();
    assert_eq!(summary.draws, 16);
    assert_eq!(summary.failed, 16);

    for row in read_rows(&summary.files) {
        assert_eq!(row[2], "true");
        assert!(row[3..].iter().all(|cell| cell.is_empty()));
    }

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_calibrated_refund_rate_stays_in_bracket() {
    let dir = scratch_dir("calibrated");
    let mut config = config_for(&dir);
    config.run.workers = 1;
    config.run.batches_per_worker = 1;
    config.run.draws_per_batch = 2;
    config.run.calibrate_refund_rate = true;
    let market = load_market_csv(&config.input.path).unwrap();

    let runner = BatchRunner::new(&config, &market, RangeSampler::new(config.parameters.clone()));
    let table = runner.run_batch(&mut streamsim_engine::SeededRng::new(3), 2);

    assert_eq!(table.len(), 2);
    for row in &table.rows {
        let params = row.params.expect("sampling succeeds with default ranges");
        assert!((0.0..1.0).contains(&params.refund_rate));
        if row.failed {
            assert_eq!(params.refund_rate, 0.0);
        }
    }

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_calibration_without_root_falls_back_to_zero_refund() {
    // With free gas neither side ever draws down while the liquidator keeps a
    // positive profit share, so the objective is negative across the bracket.
    let dir = scratch_dir("no_root");
    let mut config = config_for(&dir);
    config.run.workers = 1;
    config.run.batches_per_worker = 1;
    config.run.draws_per_batch = 2;
    config.run.calibrate_refund_rate = true;
    let market = MarketSeries::constant(3000, 0.0, 2000.0).unwrap();

    let calibrator = RefundCalibrator::new(&market, busy_params(), 7);
    let (a, b) = REFUND_RATE_BRACKET;
    assert!(calibrator.objective(a).unwrap() < 0.0);
    assert!(calibrator.objective(b).unwrap() < 0.0);
    assert!(matches!(calibrator.calibrate(), Err(BatchError::Calibration { .. })));

    let summary = BatchRunner::new(&config, &market, FixedSampler(busy_params())).run().unwrap();
    assert_eq!(summary.draws, 2);
    assert_eq!(summary.failed, 2);

    let table = BatchRunner::new(&config, &market, FixedSampler(busy_params()))
        .run_batch(&mut streamsim_engine::SeededRng::new(3), 2);
    for row in &table.rows {
        assert!(row.failed);
        assert_eq!(row.params.unwrap().refund_rate, 0.0);
        let metrics = row.metrics.expect("simulation still runs after the fallback");
        assert!(metrics.liquidator_profit > 0.0);
    }

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_same_base_seed_reproduces_results() {
    let dir = scratch_dir("reproducible");
    let config = config_for(&dir);
    let market = load_market_csv(&config.input.path).unwrap();
    let runner = BatchRunner::new(&config, &market, RangeSampler::new(config.parameters.clone()));

    let first = runner.run_batch(&mut streamsim_engine::SeededRng::new(21), 4);
    let second = runner.run_batch(&mut streamsim_engine::SeededRng::new(21), 4);
    assert_eq!(first, second);

    std::fs::remove_dir_all(dir).ok();
}
