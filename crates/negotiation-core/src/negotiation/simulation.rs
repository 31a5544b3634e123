use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::NegotiationConfig;
use crate::negotiation::state::{Edit, EditField, NegotiationState};
use crate::negotiation::summary::KindSummary;
use crate::types::*;
use crate::NegotiationResult;

/// An edit script replayed against a fresh negotiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationInput {
    pub gross_value: Money,
    #[serde(default)]
    pub edits: Vec<Edit>,
    /// Abort at the first rejected edit instead of recording it and moving on.
    #[serde(default)]
    pub stop_on_error: bool,
}

/// What happened to one edit of the script.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationStep {
    pub index: usize,
    pub field: EditField,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutput {
    pub state: NegotiationState,
    pub summary: Vec<KindSummary>,
    pub steps: Vec<SimulationStep>,
}

/// Replay `input.edits` on a negotiation seeded with `input.gross_value`.
pub fn run_simulation(
    input: &SimulationInput,
    config: &NegotiationConfig,
) -> NegotiationResult<ComputationOutput<SimulationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let mut state = NegotiationState::with_gross_value(input.gross_value, config.clone())?;
    let mut steps = Vec::with_capacity(input.edits.len());

    for (index, edit) in input.edits.iter().enumerate() {
        match state.apply(edit) {
            Ok(outcome) => steps.push(SimulationStep {
                index,
                field: outcome.field,
                applied: true,
                error_code: None,
                error: None,
                warnings: outcome.warnings.iter().map(|w| w.to_string()).collect(),
            }),
            Err(e) => {
                if input.stop_on_error {
                    return Err(e);
                }
                warnings.push(format!("Edit {index} rejected: {e}"));
                steps.push(SimulationStep {
                    index,
                    field: edit.field(),
                    applied: false,
                    error_code: Some(e.code().to_string()),
                    error: Some(e.to_string()),
                    warnings: Vec::new(),
                });
            }
        }
    }

    if !state.remaining_value().is_zero() {
        warnings.push(format!(
            "{} of the negotiated value is not allocated to any payment form",
            state.remaining_value()
        ));
    }

    let output = SimulationOutput {
        summary: state.summary(),
        state,
        steps,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Negotiation edit replay (redistribution + real-discount bisection)",
        config,
        warnings,
        elapsed,
        output,
    ))
}
