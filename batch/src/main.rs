//! Streamsim - Monte-Carlo simulator of stream liquidation P&L

use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamsim_batch::{
    load_market_csv, replay_draw, run_draw, BatchConfig, BatchRunner, DrawOptions, RangeSampler,
    VERSION,
};
use streamsim_engine::{SeededRng, SimulationParams};

fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let log_level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    init_logging(log_level);

    match matches.subcommand() {
        Some(("run", sub)) => run(&matches, sub),
        Some(("single", sub)) => single(&matches, sub),
        Some(("generate-config", sub)) => {
            let output = sub
                .get_one::<String>("output")
                .map(String::as_str)
                .unwrap_or("streamsim.yaml");
            BatchConfig::default().save_to_file(output)?;
            BatchConfig::from_file(output).context("re-reading generated config")?;
            info!("Generated example config at: {}", output);
            Ok(())
        }
        Some((other, _)) => anyhow::bail!("unknown subcommand: {}", other),
        None => anyhow::bail!("a subcommand is required"),
    }
}

fn cli() -> Command {
    let overrides = [
        Arg::new("input")
            .short('i')
            .long("input")
            .value_name("CSV")
            .help("Market data CSV (overrides input.path)"),
        Arg::new("seed")
            .short('s')
            .long("seed")
            .value_name("SEED")
            .value_parser(clap::value_parser!(u64))
            .help("Base seed (overrides run.base_seed)"),
    ];

    Command::new("streamsim")
        .version(VERSION)
        .about("Monte-Carlo simulator of stream liquidation P&L")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .global(true)
                .help("Log level (trace, debug, info, warn, error)")
                .default_value("info"),
        )
        .subcommand(
            Command::new("run")
                .about("Run every worker batch and write result tables")
                .args(overrides.clone())
                .arg(
                    Arg::new("output-dir")
                        .short('o')
                        .long("output-dir")
                        .value_name("DIR")
                        .help("Result directory (overrides output.dir)"),
                )
                .arg(
                    Arg::new("workers")
                        .short('w')
                        .long("workers")
                        .value_name("N")
                        .value_parser(clap::value_parser!(usize))
                        .help("Worker count (overrides run.workers)"),
                ),
        )
        .subcommand(
            Command::new("single")
                .about("Run one draw and print it as JSON")
                .args(overrides)
                .arg(
                    Arg::new("params")
                        .short('p')
                        .long("params")
                        .value_name("FILE")
                        .requires("draw-seed")
                        .help("Parameters of a recorded draw (YAML or JSON); skips sampling and calibration"),
                )
                .arg(
                    Arg::new("draw-seed")
                        .long("draw-seed")
                        .value_name("SEED")
                        .value_parser(clap::value_parser!(u64))
                        .requires("params")
                        .help("Seed column of the recorded draw to replay"),
                ),
        )
        .subcommand(
            Command::new("generate-config")
                .about("Write the default configuration and exit")
                .arg(
                    Arg::new("output")
                        .value_name("OUTPUT")
                        .help("Destination file")
                        .default_value("streamsim.yaml"),
                ),
        )
}

fn load_config(matches: &ArgMatches, sub: &ArgMatches) -> anyhow::Result<BatchConfig> {
    let path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = BatchConfig::load(path).context("loading configuration")?;

    if let Some(input) = sub.get_one::<String>("input") {
        config.input.path = input.clone();
    }
    if let Some(seed) = sub.get_one::<u64>("seed") {
        config.run.base_seed = *seed;
    }
    if let Ok(Some(dir)) = sub.try_get_one::<String>("output-dir") {
        config.output.dir = dir.clone();
    }
    if let Ok(Some(workers)) = sub.try_get_one::<usize>("workers") {
        config.run.workers = *workers;
    }

    config.validate()?;
    Ok(config)
}

fn run(matches: &ArgMatches, sub: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(matches, sub)?;
    info!(version = VERSION, input = %config.input.path, "Streamsim starting");

    let market = load_market_csv(&config.input.path)
        .with_context(|| format!("reading market data from {}", config.input.path))?;

    let sampler = RangeSampler::new(config.parameters.clone());
    let summary = BatchRunner::new(&config, &market, sampler).run()?;

    info!(
        draws = summary.draws,
        failed = summary.failed,
        dir = %config.output.dir,
        "Streamsim finished"
    );
    Ok(())
}

fn single(matches: &ArgMatches, sub: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(matches, sub)?;
    let market = load_market_csv(&config.input.path)
        .with_context(|| format!("reading market data from {}", config.input.path))?;

    let row = match (sub.get_one::<String>("params"), sub.get_one::<u64>("draw-seed")) {
        (Some(path), Some(seed)) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading parameters from {}", path))?;
            let params: SimulationParams = serde_yaml::from_str(&content)?;
            params.validate()?;
            replay_draw(&market, params, *seed, 0)
        }
        _ => {
            let sampler = RangeSampler::new(config.parameters.clone());
            let mut rng = SeededRng::new(config.run.base_seed);
            run_draw(&market, &sampler, DrawOptions::from(&config), &mut rng, 0)
        }
    };

    println!("{}", serde_json::to_string_pretty(&row)?);
    Ok(())
}

/// Initialize logging
fn init_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("Invalid log level: {}. Using 'info'", log_level);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("streamsim_batch={level},streamsim_engine={level},streamsim={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
