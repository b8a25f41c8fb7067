use clap::{Parser, Subcommand};
use log::info;
use monty::{
    commands::{backtest, compile, stress_test},
    context::AppContext,
    presentation::{ChartOptions, PathMetric, DEFAULT_DISPLAY_PATHS, MAX_DISPLAY_PATHS},
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "monty")]
#[command(about = "Build indicator strategies, backtest them and stress-test them with Monte Carlo re-simulation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the request payload a strategy form compiles to
    Compile {
        /// Strategy form JSON file
        form: PathBuf,
    },
    /// Run a single backtest for a strategy form
    Backtest {
        /// Strategy form JSON file
        form: PathBuf,
        /// Print the result as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Backtest, re-simulate with Monte Carlo and fetch the results analysis
    StressTest {
        /// Strategy form JSON file
        form: PathBuf,
        /// Years of history to sample from (1-20)
        #[arg(long)]
        lookback_years: Option<u32>,
        /// Trading days per simulated path (21-504)
        #[arg(long)]
        simulation_length_days: Option<u32>,
        /// Number of simulated paths (100-1000)
        #[arg(long)]
        num_simulations: Option<u32>,
        /// Number of paths to include in the chart
        #[arg(long, default_value_t = DEFAULT_DISPLAY_PATHS as u64, value_parser = clap::value_parser!(u64).range(1..=MAX_DISPLAY_PATHS as u64))]
        paths: u64,
        /// Per-path metric summarized across all simulations
        #[arg(long, value_enum, default_value_t = PathMetric::FinalValue)]
        path_metric: PathMetric,
        /// Print the result as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli { command } = Cli::parse();

    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match command {
        Commands::Compile { form } => {
            compile::run(&form)?;
        }
        Commands::Backtest { form, json } => {
            let app = AppContext::from_env()?;
            info!("Starting backtest. Not financial advice.");
            backtest::run(&app, &form, json).await?;
        }
        Commands::StressTest {
            form,
            lookback_years,
            simulation_length_days,
            num_simulations,
            paths,
            path_metric,
            json,
        } => {
            let app = AppContext::from_env()?;
            info!("Starting stress test. Not financial advice.");
            let overrides = stress_test::SimulationOverrides {
                lookback_years,
                simulation_length_days,
                num_simulations,
            };
            let chart = ChartOptions {
                display_paths: paths as usize,
                path_metric,
            };
            stress_test::run(&app, &form, overrides, chart, json).await?;
        }
    }

    Ok(())
}
