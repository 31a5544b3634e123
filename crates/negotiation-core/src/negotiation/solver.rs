//! Real-discount solver.
//!
//! Finds the negotiated value whose redistributed instruments yield a target
//! real discount. Real discount decreases monotonically as the negotiated
//! value grows, so the search is a plain bisection over `[0, gross]`, using
//! the redistributor and the valuator to evaluate each candidate.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::NegotiationConfig;
use crate::error::NegotiationError;
use crate::negotiation::redistribution::{
    face_total, instruments_from_specs, present_total, redistribute,
};
use crate::payment::instrument::{InstrumentSpec, PaymentInstrument};
use crate::time_value::discount_percent;
use crate::types::*;
use crate::NegotiationResult;

/// Bisection knobs, usually taken from [`NegotiationConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    pub max_iterations: u32,
    /// Stop once the achieved real discount is this close to the target
    /// (percentage points).
    pub tolerance: Percent,
    pub redistribution_tolerance: Money,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams::from(&NegotiationConfig::default())
    }
}

impl From<&NegotiationConfig> for SolverParams {
    fn from(cfg: &NegotiationConfig) -> Self {
        Self {
            max_iterations: cfg.solver_max_iterations,
            tolerance: cfg.solver_tolerance,
            redistribution_tolerance: cfg.redistribution_tolerance,
        }
    }
}

/// Best candidate found by the solver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealDiscountSolution {
    pub negotiated_value: Money,
    pub achieved_real_discount: Percent,
    pub iterations: u32,
    pub converged: bool,
    /// Instruments redistributed onto `negotiated_value`.
    pub instruments: Vec<PaymentInstrument>,
}

/// Search `[0, gross_value]` for the negotiated value achieving
/// `target_real_discount`.
///
/// Always returns the best candidate seen, converged or not. The only error
/// is `CannotRedistribute` when no candidate at all could be redistributed.
pub fn solve_for_real_discount(
    target_real_discount: Percent,
    gross_value: Money,
    instruments: &[PaymentInstrument],
    params: &SolverParams,
) -> NegotiationResult<RealDiscountSolution> {
    if gross_value <= Decimal::ZERO {
        return Ok(RealDiscountSolution {
            negotiated_value: face_total(instruments),
            achieved_real_discount: Decimal::ZERO,
            iterations: 0,
            converged: false,
            instruments: instruments.to_vec(),
        });
    }

    let mut lo = Decimal::ZERO;
    let mut hi = gross_value;
    let mut best: Option<(Decimal, RealDiscountSolution)> = None;
    let mut last_failure: Option<NegotiationError> = None;
    let mut iterations = 0;

    for iter in 1..=params.max_iterations {
        iterations = iter;
        let candidate = (lo + hi) / dec!(2);

        let redistributed = match redistribute(candidate, instruments, params.redistribution_tolerance) {
            Ok(r) => r,
            Err(e @ NegotiationError::CannotRedistribute { .. }) => {
                // Unreachable candidate: search higher
                tracing::debug!(iter, %candidate, "candidate cannot be redistributed, moving up");
                last_failure = Some(e);
                lo = candidate;
                continue;
            }
            Err(e) => return Err(e),
        };

        let achieved = discount_percent(gross_value, present_total(&redistributed.instruments));
        let error = (achieved - target_real_discount).abs();
        tracing::debug!(iter, %candidate, %achieved, %error, "real-discount bisection step");

        let improves = best.as_ref().map_or(true, |(best_err, _)| error < *best_err);
        if improves {
            best = Some((
                error,
                RealDiscountSolution {
                    negotiated_value: candidate,
                    achieved_real_discount: achieved,
                    iterations: iter,
                    converged: false,
                    instruments: redistributed.instruments,
                },
            ));
        }

        if error < params.tolerance {
            break;
        }

        if achieved < target_real_discount {
            hi = candidate;
        } else {
            lo = candidate;
        }
    }

    match best {
        Some((error, mut solution)) => {
            solution.iterations = iterations;
            solution.converged = error < params.tolerance;
            if !solution.converged {
                tracing::debug!(
                    target = %target_real_discount,
                    achieved = %solution.achieved_real_discount,
                    "solver exhausted iterations, returning best candidate"
                );
            }
            Ok(solution)
        }
        None => Err(last_failure.unwrap_or(NegotiationError::CannotRedistribute {
            delta: Decimal::ZERO,
        })),
    }
}

/// Input for a standalone solve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveInput {
    pub target_real_discount: Percent,
    pub gross_value: Money,
    pub instruments: Vec<InstrumentSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveOutput {
    pub negotiated_value: Money,
    pub discount_percent: Percent,
    pub achieved_real_discount: Percent,
    pub total_received: Money,
    pub iterations: u32,
    pub converged: bool,
    pub instruments: Vec<PaymentInstrument>,
}

/// Solve on form payloads and wrap the result in the standard envelope.
pub fn run_solver(
    input: &SolveInput,
    config: &NegotiationConfig,
) -> NegotiationResult<ComputationOutput<SolveOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let params = SolverParams::from(config);
    let instruments = instruments_from_specs(&input.instruments)?;
    let solution = solve_for_real_discount(
        input.target_real_discount,
        input.gross_value,
        &instruments,
        &params,
    )?;

    if !solution.converged {
        warnings.push(format!(
            "Target real discount {}% not reached within {} iterations; best achieved {}%",
            input.target_real_discount,
            solution.iterations,
            solution.achieved_real_discount.round_dp(4)
        ));
    }

    let output = SolveOutput {
        negotiated_value: solution.negotiated_value,
        discount_percent: discount_percent(input.gross_value, solution.negotiated_value),
        achieved_real_discount: solution.achieved_real_discount,
        total_received: present_total(&solution.instruments),
        iterations: solution.iterations,
        converged: solution.converged,
        instruments: solution.instruments,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Bisection on negotiated value for target real discount",
        &serde_json::json!({
            "target_real_discount": input.target_real_discount.to_string(),
            "gross_value": input.gross_value.to_string(),
            "max_iterations": params.max_iterations,
            "tolerance_pp": params.tolerance.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn build(specs: Vec<InstrumentSpec>) -> Vec<PaymentInstrument> {
        instruments_from_specs(&specs).unwrap()
    }

    #[test]
    fn test_single_cash_converges() {
        let insts = build(vec![InstrumentSpec::cash(dec!(50000))]);
        let sol = solve_for_real_discount(dec!(10), dec!(100000), &insts, &SolverParams::default()).unwrap();
        assert!(sol.converged);
        assert!(sol.iterations <= 25);
        assert!((sol.achieved_real_discount - dec!(10)).abs() < dec!(0.01));
        assert!((sol.negotiated_value - dec!(90000)).abs() < dec!(10));
    }

    #[test]
    fn test_empty_cash_uses_initial_allocation() {
        let insts = build(vec![InstrumentSpec::cash(Decimal::ZERO)]);
        let sol = solve_for_real_discount(dec!(20), dec!(10000), &insts, &SolverParams::default()).unwrap();
        assert!(sol.converged);
        assert!((sol.instruments[0].face_value() - dec!(8000)).abs() < dec!(1));
    }

    #[test]
    fn test_discounted_instrument_needs_higher_negotiated_value() {
        // Financing costs time value, so reaching 10% real discount needs a
        // negotiated value above 90% of gross
        let insts = build(vec![InstrumentSpec::financing(dec!(1000), 10, dec!(0.01))]);
        let sol = solve_for_real_discount(dec!(10), dec!(100000), &insts, &SolverParams::default()).unwrap();
        assert!(sol.converged);
        assert!(sol.negotiated_value > dec!(90000));
    }

    #[test]
    fn test_unreachable_target_returns_best_effort() {
        // A locked cash instrument pins the real discount; nothing can move it
        let insts = build(vec![
            InstrumentSpec::cash(dec!(95000)).locked(),
            InstrumentSpec::card(dec!(0), 1, dec!(0), dec!(0)),
        ]);
        let sol = solve_for_real_discount(dec!(40), dec!(100000), &insts, &SolverParams::default()).unwrap();
        assert!(!sol.converged);
        assert_eq!(sol.iterations, 25);
        assert!((sol.achieved_real_discount - dec!(5)).abs() < dec!(0.01));
    }

    #[test]
    fn test_all_locked_reports_cannot_redistribute() {
        // Every candidate above 50000 differs from the locked 30000 total
        let insts = build(vec![InstrumentSpec::cash(dec!(30000)).locked()]);
        let err = solve_for_real_discount(dec!(10), dec!(100000), &insts, &SolverParams::default()).unwrap_err();
        assert_eq!(err.code(), "CANNOT_REDISTRIBUTE");
    }

    #[test]
    fn test_zero_gross_is_degenerate_not_error() {
        let insts = build(vec![InstrumentSpec::cash(dec!(100))]);
        let sol = solve_for_real_discount(dec!(10), Decimal::ZERO, &insts, &SolverParams::default()).unwrap();
        assert_eq!(sol.achieved_real_discount, Decimal::ZERO);
        assert_eq!(sol.iterations, 0);
    }

    #[test]
    fn test_run_solver_envelope() {
        let out = run_solver(
            &SolveInput {
                target_real_discount: dec!(10),
                gross_value: dec!(100000),
                instruments: vec![InstrumentSpec::cash(dec!(100000))],
            },
            &NegotiationConfig::default(),
        )
        .unwrap();
        assert!(out.result.converged);
        assert!(out.warnings.is_empty());
        assert!((out.result.discount_percent - dec!(10)).abs() < dec!(0.01));
    }
}
