use clap::Args;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

use negotiation_core::negotiation::redistribution::{self, RedistributionInput};
use negotiation_core::negotiation::simulation::{self, SimulationInput};
use negotiation_core::negotiation::solver::{self, SolveInput};
use negotiation_core::timeline::{self, TimelineInput};
use negotiation_core::NegotiationConfig;

use crate::input;

fn read_payload<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        input::file::read_json(path)
    } else if let Some(data) = input::stdin::read_stdin()? {
        Ok(serde_json::from_value(data)?)
    } else {
        Err(format!("--input <file.json> or stdin required for {what}").into())
    }
}

/// Arguments for priority redistribution
#[derive(Args)]
pub struct RedistributeArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the target total from the input
    #[arg(long)]
    pub target_total: Option<Decimal>,
}

pub fn run_redistribute(
    args: RedistributeArgs,
    config: &NegotiationConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut redistribution_input: RedistributionInput =
        read_payload(args.input.as_deref(), "redistribution")?;
    if let Some(target) = args.target_total {
        redistribution_input.target_total = target;
    }
    if redistribution_input.tolerance.is_none() {
        redistribution_input.tolerance = Some(config.redistribution_tolerance);
    }
    let result = redistribution::run_redistribution(&redistribution_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for the real-discount solver
#[derive(Args)]
pub struct SolveArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the target real discount (percent) from the input
    #[arg(long)]
    pub target: Option<Decimal>,
}

pub fn run_solve(args: SolveArgs, config: &NegotiationConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let mut solve_input: SolveInput = read_payload(args.input.as_deref(), "the solver")?;
    if let Some(target) = args.target {
        solve_input.target_real_discount = target;
    }
    let result = solver::run_solver(&solve_input, config)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for replaying an edit script
#[derive(Args)]
pub struct SimulateArgs {
    /// Path to JSON input file with `gross_value` and `edits`
    #[arg(long)]
    pub input: Option<String>,

    /// Abort at the first rejected edit
    #[arg(long)]
    pub stop_on_error: bool,
}

pub fn run_simulate(
    args: SimulateArgs,
    config: &NegotiationConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut simulation_input: SimulationInput = read_payload(args.input.as_deref(), "simulation")?;
    simulation_input.stop_on_error |= args.stop_on_error;
    let result = simulation::run_simulation(&simulation_input, config)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for the receipt timeline
#[derive(Args)]
pub struct TimelineArgs {
    /// Path to JSON input file with `reference_date` and `instruments`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_timeline(args: TimelineArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let timeline_input: TimelineInput = read_payload(args.input.as_deref(), "the timeline")?;
    let result = timeline::run_timeline(&timeline_input)?;
    Ok(serde_json::to_value(result)?)
}
