//! End-to-end tests for the simulation engine
//!
//! Tests the complete pipeline:
//! Params → Events → Binning → P&L → Metrics

use streamsim_engine::*;

fn fixed_params(gas_prediction_ability: f64) -> SimulationParams {
    SimulationParams {
        upfront_fee: 0.01,
        monthly_opened_streams: 200_000.0,
        average_stream_lifetime: 0.2,
        percent_accidentally_liquidated_per_month: 30.0,
        average_stream_size: 1000.0,
        upfront_hours: 4.0,
        refund_rate: 0.4,
        min_self_liquidation_savings: 1.0,
        gas_prediction_ability,
        lowest_stream_cost_ratio: None,
        stream_size_shape: 4.0,
    }
}

fn run(market: &MarketSeries, params: SimulationParams, seed: u64) -> SimulationRun {
    let mut rng = SeededRng::new(seed);
    Simulation::new(market, params).unwrap().run(&mut rng).unwrap()
}

#[test]
fn test_constant_market_is_deterministic_under_seed() {
    let market = MarketSeries::constant(1000, 1.0, 1.0).unwrap();

    let first = run(&market, fixed_params(0.0), 1234);
    let second = run(&market, fixed_params(0.0), 1234);

    assert_eq!(first.pnl.liquidator_pl, second.pnl.liquidator_pl);
    assert_eq!(first.pnl.gas_tank_eth_pl, second.pnl.gas_tank_eth_pl);
    assert_eq!(first.metrics, second.metrics);
    assert!(first.events.opened > 0);
}

#[test]
fn test_predictive_run_is_deterministic_under_seed() {
    let market = MarketSeries::constant(1000, 1.0, 1.0).unwrap();

    let first = run(&market, fixed_params(0.5), 99);
    let second = run(&market, fixed_params(0.5), 99);

    assert_eq!(first, second);
    // 30 minutes of lookahead leaves a 28 minute window
    assert_eq!(first.pnl.len(), 1000 - 28 + 1);
}

#[test]
fn test_different_seeds_differ() {
    let market = MarketSeries::constant(1000, 1.0, 1.0).unwrap();
    let a = run(&market, fixed_params(0.0), 1);
    let b = run(&market, fixed_params(0.0), 2);
    assert_ne!(a.pnl.liquidator_pl, b.pnl.liquidator_pl);
}

#[test]
fn test_boundary_prediction_ability_uses_naive_mode() {
    let market = MarketSeries::constant(1000, 1.0, 1.0).unwrap();
    let result = run(&market, fixed_params(3.0 / 60.0), 7);

    assert_eq!(result.pnl.mode, LiquidatorMode::Naive);
    assert_eq!(result.pnl.len(), 1000);
    assert_eq!(result.pnl.gas_price_paid, market.median_gas_price().to_vec());
}

#[test]
fn test_every_viable_stream_resolves_once() {
    let market = MarketSeries::constant(3000, 40.0, 2500.0).unwrap();
    let mut params = fixed_params(0.0);
    params.lowest_stream_cost_ratio = Some(2.0);

    for seed in 0..5 {
        let e = run(&market, params, seed).events;
        assert_eq!(e.liquidated + e.self_closed + e.censored, e.opened);
        assert!(e.reclassified <= e.liquidated);
    }
}

#[test]
fn test_binned_counts_match_event_counts() {
    let market = MarketSeries::constant(2000, 10.0, 1000.0).unwrap();
    let result = run(&market, fixed_params(0.0), 5);

    let total = |v: &[u32]| v.iter().map(|&c| c as usize).sum::<usize>();
    assert_eq!(result.binned.len(), 2000);
    assert_eq!(total(&result.binned.n_opened), result.events.opened);
    assert_eq!(total(&result.binned.n_liquidated), result.events.liquidated);
    assert_eq!(total(&result.binned.n_self_closed), result.events.self_closed);
}

#[test]
fn test_single_liquidation_with_falling_gas_executes_last() {
    let n = 40;
    let market = MarketSeries::new(
        vec![50.0; n],
        vec![50.0; n],
        vec![3000.0; n],
        Some((0..n).map(|i| 200.0 - 4.0 * i as f64).collect()),
    )
    .unwrap();
    let binned = BinnedSeries {
        n_opened: vec![0; n],
        n_liquidated: (0..n).map(|i| if i == 0 { 1 } else { 0 }).collect(),
        n_self_closed: vec![0; n],
        avg_liquidation_size: (0..n).map(|i| if i == 0 { 5000.0 } else { 0.0 }).collect(),
        avg_self_closed_size: vec![0.0; n],
    };
    // a quarter hour of foresight gives a 13 minute window
    let params = fixed_params(0.25);
    let pnl = PnlEngine::new(&market, &params).compute(&binned).unwrap();

    assert_eq!(pnl.gas_price_paid[0], 200.0 - 4.0 * 12.0);
}

#[test]
fn test_zero_opens_gives_finite_metrics() {
    let market = MarketSeries::constant(100, 1.0, 1.0).unwrap();
    let mut params = fixed_params(0.0);
    params.monthly_opened_streams = 0.0;
    let result = run(&market, params, 0);

    assert_eq!(result.events.opened, 0);
    assert_eq!(result.metrics.percent_closed, 0.0);
    assert_eq!(result.metrics.percent_self_closed, 0.0);
    assert!(result.metrics.to_columns().iter().all(|(_, v)| v.is_finite()));
}
