mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::instrument::{PresentValueArgs, ScheduleArgs};
use commands::negotiation::{RedistributeArgs, SimulateArgs, SolveArgs, TimelineArgs};
use negotiation_core::NegotiationConfig;

/// Budget negotiation calculator
#[derive(Parser)]
#[command(
    name = "negcalc",
    version,
    about = "Budget negotiation calculator",
    long_about = "Values payment instruments (cash, boleto, card, financing), redistributes \
                  a negotiated total across them and solves for a target real discount, \
                  with decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Negotiation settings file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log calculation steps to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Present value of a single payment instrument
    PresentValue(PresentValueArgs),
    /// Equal-split monthly installment schedule
    Schedule(ScheduleArgs),
    /// Redistribute a target total across payment instruments
    Redistribute(RedistributeArgs),
    /// Solve for the negotiated value that yields a target real discount
    Solve(SolveArgs),
    /// Replay an edit script against a fresh negotiation
    Simulate(SimulateArgs),
    /// Receipt timeline for a set of payment instruments
    Timeline(TimelineArgs),
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
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&str>) -> Result<NegotiationConfig, Box<dyn std::error::Error>> {
    match path {
        Some(p) => input::file::read_config(p),
        None => Ok(NegotiationConfig::default()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::PresentValue(args) => commands::instrument::run_present_value(args),
        Commands::Schedule(args) => commands::instrument::run_schedule(args),
        Commands::Redistribute(args) => commands::negotiation::run_redistribute(args, &config),
        Commands::Solve(args) => commands::negotiation::run_solve(args, &config),
        Commands::Simulate(args) => commands::negotiation::run_simulate(args, &config),
        Commands::Timeline(args) => commands::negotiation::run_timeline(args),
        Commands::Version => {
            println!("negcalc {}", env!("CARGO_PKG_VERSION"));
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
