use napi::Result as NapiResult;
use napi_derive::napi;

use negotiation_core::NegotiationConfig;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Parse optional settings JSON; absent or empty means defaults.
fn parse_config(config_json: Option<String>) -> NapiResult<NegotiationConfig> {
    match config_json.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => serde_json::from_str(s).map_err(to_napi_error),
        _ => Ok(NegotiationConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Instruments
// ---------------------------------------------------------------------------

#[napi]
pub fn present_value(input_json: String) -> NapiResult<String> {
    let input: negotiation_core::InstrumentSpec =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        negotiation_core::payment::valuation::value_instrument(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn generate_schedule(input_json: String) -> NapiResult<String> {
    let input: negotiation_core::payment::schedule::ScheduleInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        negotiation_core::payment::schedule::generate_schedule(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Negotiation
// ---------------------------------------------------------------------------

#[napi]
pub fn redistribute(input_json: String) -> NapiResult<String> {
    let input: negotiation_core::negotiation::redistribution::RedistributionInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = negotiation_core::negotiation::redistribution::run_redistribution(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn solve_real_discount(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = parse_config(config_json)?;
    let input: negotiation_core::negotiation::solver::SolveInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        negotiation_core::negotiation::solver::run_solver(&input, &config).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn simulate_negotiation(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = parse_config(config_json)?;
    let input: negotiation_core::negotiation::simulation::SimulationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = negotiation_core::negotiation::simulation::run_simulation(&input, &config)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[napi]
pub fn receipt_timeline(input_json: String) -> NapiResult<String> {
    let input: negotiation_core::timeline::TimelineInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = negotiation_core::timeline::run_timeline(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
