mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::analysis::AnalyzeArgs;
use commands::monte_carlo::SimulateArgs;
use commands::valuation::ValueArgs;

/// Discounted cash flow valuation with Monte Carlo uncertainty analysis
#[derive(Parser)]
#[command(
    name = "dcf",
    version,
    about = "Discounted cash flow valuation with Monte Carlo uncertainty analysis",
    long_about = "Values a company from projected free cash flows discounted at its WACC, \
                  with a Gordon growth terminal value, and estimates the distribution of \
                  equity value by re-running the valuation on perturbed inputs. Reads JSON \
                  or YAML requests from --input or stdin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log pipeline stages to stderr (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Point DCF valuation
    Value(ValueArgs),
    /// Monte Carlo distribution of equity value
    Simulate(SimulateArgs),
    /// Valuation and simulation in one report, optionally exported to a file
    Analyze(AnalyzeArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Value(args) => commands::valuation::run_value(args),
        Commands::Simulate(args) => commands::monte_carlo::run_simulate(args),
        Commands::Analyze(args) => commands::analysis::run_analyze(args),
        Commands::Version => {
            println!("dcf {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
