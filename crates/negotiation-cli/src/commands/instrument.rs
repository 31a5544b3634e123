use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use negotiation_core::payment::schedule::{self, ScheduleInput};
use negotiation_core::payment::valuation;
use negotiation_core::InstrumentSpec;

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Cash,
    Boleto,
    Financing,
    Card,
}

/// Arguments for single-instrument valuation
#[derive(Args)]
pub struct PresentValueArgs {
    /// Path to JSON instrument spec (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Instrument kind
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,

    /// Nominal amount paid through the instrument
    #[arg(long)]
    pub face_value: Option<Decimal>,

    /// Number of monthly installments
    #[arg(long, default_value_t = 1)]
    pub installments: u32,

    /// Monthly interest rate (financing) or capital cost rate (boleto), as a decimal
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Card deflation rate, as a decimal
    #[arg(long)]
    pub deflation_rate: Option<Decimal>,

    /// Card anticipation rate per installment, as a decimal
    #[arg(long)]
    pub anticipation_rate: Option<Decimal>,

    /// First due date (YYYY-MM-DD) for boleto or financing
    #[arg(long)]
    pub first_due_date: Option<NaiveDate>,
}

pub fn run_present_value(args: PresentValueArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let spec: InstrumentSpec = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let kind = args.kind.ok_or("--kind is required (or provide --input)")?;
        let face = args
            .face_value
            .ok_or("--face-value is required (or provide --input)")?;
        spec_from_flags(kind, face, &args)?
    };

    let result = valuation::value_instrument(&spec)?;
    Ok(serde_json::to_value(result)?)
}

fn spec_from_flags(
    kind: KindArg,
    face: Decimal,
    args: &PresentValueArgs,
) -> Result<InstrumentSpec, Box<dyn std::error::Error>> {
    let spec = match kind {
        KindArg::Cash => InstrumentSpec::cash(face),
        KindArg::Boleto => {
            let rate = args.rate.ok_or("--rate is required for boleto")?;
            InstrumentSpec::boleto(face, args.installments, rate)
        }
        KindArg::Financing => {
            let rate = args.rate.ok_or("--rate is required for financing")?;
            InstrumentSpec::financing(face, args.installments, rate)
        }
        KindArg::Card => {
            let deflation = args
                .deflation_rate
                .ok_or("--deflation-rate is required for card")?;
            let anticipation = args
                .anticipation_rate
                .ok_or("--anticipation-rate is required for card")?;
            InstrumentSpec::card(face, args.installments, deflation, anticipation)
        }
    };
    Ok(match args.first_due_date {
        Some(date) => spec.first_due_on(date),
        None => spec,
    })
}

/// Arguments for an equal-split installment schedule
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Amount to split
    #[arg(long)]
    pub face_value: Option<Decimal>,

    /// Number of monthly installments
    #[arg(long)]
    pub installments: Option<u32>,

    /// First due date (YYYY-MM-DD)
    #[arg(long)]
    pub first_due_date: Option<NaiveDate>,
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let schedule_input: ScheduleInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        ScheduleInput {
            face_value: args
                .face_value
                .ok_or("--face-value is required (or provide --input)")?,
            installments: args
                .installments
                .ok_or("--installments is required (or provide --input)")?,
            first_due_date: args
                .first_due_date
                .ok_or("--first-due-date is required (or provide --input)")?,
        }
    };

    let result = schedule::generate_schedule(&schedule_input)?;
    Ok(serde_json::to_value(result)?)
}
