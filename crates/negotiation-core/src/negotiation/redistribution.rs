use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::NegotiationError;
use crate::payment::instrument::{InstrumentSpec, PaymentInstrument};
use crate::time_value::round_money;
use crate::types::*;
use crate::NegotiationResult;

/// Result of moving the instrument total onto a new target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Redistribution {
    pub instruments: Vec<PaymentInstrument>,
    /// Ids whose face value changed, in the order they were adjusted.
    pub adjusted: Vec<String>,
    /// Part of the delta that could not be absorbed because the receiving
    /// instrument was clamped at zero.
    pub unabsorbed: Money,
}

impl Redistribution {
    fn unchanged(instruments: &[PaymentInstrument]) -> Self {
        Self {
            instruments: instruments.to_vec(),
            adjusted: Vec::new(),
            unabsorbed: Decimal::ZERO,
        }
    }
}

pub fn face_total(instruments: &[PaymentInstrument]) -> Money {
    instruments.iter().map(|i| i.face_value()).sum()
}

pub fn present_total(instruments: &[PaymentInstrument]) -> Money {
    instruments.iter().map(|i| i.present_value()).sum()
}

/// Reallocate `target_total - Σ face` across the unlocked instruments.
///
/// Priority is cash, boleto, financing, card. The highest-priority unlocked
/// instrument takes the whole delta, clamped at zero; a clamped remainder is
/// not cascaded to the next instrument. When every unlocked instrument is
/// still empty and the delta is positive, the delta is split evenly instead.
/// Locked instruments are never touched.
pub fn redistribute(
    target_total: Money,
    instruments: &[PaymentInstrument],
    tolerance: Money,
) -> NegotiationResult<Redistribution> {
    let delta = target_total - face_total(instruments);
    if delta.abs() < tolerance {
        return Ok(Redistribution::unchanged(instruments));
    }

    // Unlocked positions, highest priority first; ties keep insertion order
    let mut unlocked: Vec<usize> = (0..instruments.len())
        .filter(|&idx| !instruments[idx].is_locked())
        .collect();
    if unlocked.is_empty() {
        tracing::warn!(%delta, "redistribution blocked: every instrument is locked");
        return Err(NegotiationError::CannotRedistribute { delta });
    }
    unlocked.sort_by_key(|&idx| instruments[idx].kind());

    let mut next = instruments.to_vec();
    let mut adjusted = Vec::new();
    let mut unabsorbed = Decimal::ZERO;

    let all_empty = unlocked.iter().all(|&idx| instruments[idx].face_value().is_zero());
    if all_empty && delta > Decimal::ZERO {
        let share = round_money(delta / Decimal::from(unlocked.len() as u64));
        let mut allocated = Decimal::ZERO;
        for (pos, &idx) in unlocked.iter().enumerate() {
            let amount = if pos + 1 == unlocked.len() {
                delta - allocated
            } else {
                share
            };
            allocated += amount;
            next[idx].set_face_value(amount)?;
            adjusted.push(next[idx].id().to_string());
        }
        tracing::debug!(%delta, count = unlocked.len(), "initial allocation split evenly");
    } else {
        let idx = unlocked[0];
        let proposed = instruments[idx].face_value() + delta;
        if proposed < Decimal::ZERO {
            unabsorbed = proposed;
        }
        next[idx].set_face_value(proposed.max(Decimal::ZERO))?;
        adjusted.push(next[idx].id().to_string());
        tracing::debug!(
            %delta,
            instrument = next[idx].id(),
            kind = %next[idx].kind(),
            %unabsorbed,
            "delta absorbed by highest-priority unlocked instrument"
        );
    }

    Ok(Redistribution {
        instruments: next,
        adjusted,
        unabsorbed,
    })
}

/// Input for a standalone redistribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedistributionInput {
    pub target_total: Money,
    pub instruments: Vec<InstrumentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<Money>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedistributionOutput {
    pub instruments: Vec<PaymentInstrument>,
    pub adjusted: Vec<String>,
    pub face_total: Money,
    pub present_total: Money,
    pub remaining_value: Money,
}

/// Build instruments from specs, assigning positional ids to specs without one.
pub fn instruments_from_specs(specs: &[InstrumentSpec]) -> NegotiationResult<Vec<PaymentInstrument>> {
    specs
        .iter()
        .enumerate()
        .map(|(pos, spec)| {
            let id = spec
                .id
                .clone()
                .unwrap_or_else(|| format!("{}-{}", spec.terms.kind().slug(), pos + 1));
            PaymentInstrument::from_spec(id, spec)
        })
        .collect()
}

/// Run a redistribution on form payloads and wrap the result in the standard envelope.
pub fn run_redistribution(
    input: &RedistributionInput,
) -> NegotiationResult<ComputationOutput<RedistributionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let tolerance = input
        .tolerance
        .unwrap_or_else(|| crate::config::NegotiationConfig::default().redistribution_tolerance);
    let instruments = instruments_from_specs(&input.instruments)?;
    let result = redistribute(input.target_total, &instruments, tolerance)?;

    if !result.unabsorbed.is_zero() {
        warnings.push(format!(
            "Shortfall of {} not absorbed: receiving instrument clamped at zero",
            -result.unabsorbed
        ));
    }

    let face = face_total(&result.instruments);
    let output = RedistributionOutput {
        face_total: face,
        present_total: present_total(&result.instruments),
        remaining_value: input.target_total - face,
        adjusted: result.adjusted,
        instruments: result.instruments,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Priority redistribution (cash, boleto, financing, card)",
        &serde_json::json!({
            "target_total": input.target_total.to_string(),
            "tolerance": tolerance.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::instrument::InstrumentKind;
    use rust_decimal_macros::dec;

    const TOL: Decimal = dec!(0.01);

    fn build(specs: Vec<InstrumentSpec>) -> Vec<PaymentInstrument> {
        instruments_from_specs(&specs).unwrap()
    }

    #[test]
    fn test_within_tolerance_is_noop() {
        let insts = build(vec![InstrumentSpec::cash(dec!(100))]);
        let out = redistribute(dec!(100.005), &insts, TOL).unwrap();
        assert_eq!(out.instruments, insts);
        assert!(out.adjusted.is_empty());
    }

    #[test]
    fn test_all_locked_fails() {
        let insts = build(vec![InstrumentSpec::cash(dec!(100)).locked()]);
        let err = redistribute(dec!(150), &insts, TOL).unwrap_err();
        assert_eq!(err, NegotiationError::CannotRedistribute { delta: dec!(50) });
    }

    #[test]
    fn test_empty_list_fails_when_delta_nonzero() {
        assert!(redistribute(dec!(10), &[], TOL).is_err());
    }

    #[test]
    fn test_cash_absorbs_before_card() {
        let insts = build(vec![
            InstrumentSpec::card(dec!(500), 3, dec!(0.03), dec!(0.02)),
            InstrumentSpec::cash(dec!(500)),
        ]);
        let out = redistribute(dec!(1200), &insts, TOL).unwrap();
        assert_eq!(out.instruments[0].face_value(), dec!(500));
        assert_eq!(out.instruments[1].face_value(), dec!(700));
        assert_eq!(out.adjusted, vec!["cash-2".to_string()]);
    }

    #[test]
    fn test_boleto_before_financing() {
        let insts = build(vec![
            InstrumentSpec::financing(dec!(100), 6, dec!(0.02)),
            InstrumentSpec::boleto(dec!(100), 2, dec!(0.01)),
        ]);
        let out = redistribute(dec!(150), &insts, TOL).unwrap();
        assert_eq!(out.instruments[1].kind(), InstrumentKind::Boleto);
        assert_eq!(out.instruments[1].face_value(), dec!(50));
        assert_eq!(out.instruments[0].face_value(), dec!(100));
    }

    #[test]
    fn test_shortfall_clamped_not_cascaded() {
        let insts = build(vec![
            InstrumentSpec::cash(dec!(100)),
            InstrumentSpec::boleto(dec!(400), 2, dec!(0.01)),
        ]);
        let out = redistribute(dec!(300), &insts, TOL).unwrap();
        assert_eq!(out.instruments[0].face_value(), Decimal::ZERO);
        assert_eq!(out.instruments[1].face_value(), dec!(400));
        assert_eq!(out.unabsorbed, dec!(-100));
    }

    #[test]
    fn test_initial_allocation_splits_evenly() {
        let insts = build(vec![
            InstrumentSpec::cash(dec!(0)),
            InstrumentSpec::boleto(dec!(0), 3, dec!(0.01)),
            InstrumentSpec::card(dec!(0), 2, dec!(0.03), dec!(0.02)),
        ]);
        let out = redistribute(dec!(1000), &insts, TOL).unwrap();
        let faces: Vec<Money> = out.instruments.iter().map(|i| i.face_value()).collect();
        assert_eq!(faces, vec![dec!(333.33), dec!(333.33), dec!(333.34)]);
        assert_eq!(face_total(&out.instruments), dec!(1000));
    }

    #[test]
    fn test_locked_instruments_untouched() {
        let insts = build(vec![
            InstrumentSpec::cash(dec!(20000)).locked(),
            InstrumentSpec::boleto(dec!(30000), 4, dec!(0.012)),
        ]);
        let out = redistribute(dec!(40000), &insts, TOL).unwrap();
        assert_eq!(out.instruments[0], insts[0]);
        assert_eq!(out.instruments[1].face_value(), dec!(20000));
    }

    #[test]
    fn test_present_value_follows_face_value() {
        let insts = build(vec![InstrumentSpec::financing(dec!(1000), 12, dec!(0.02))]);
        let out = redistribute(dec!(2000), &insts, TOL).unwrap();
        let pv = out.instruments[0].present_value();
        assert!((pv - dec!(1576.99)).abs() < dec!(0.01), "got {pv}");
    }

    #[test]
    fn test_run_redistribution_envelope() {
        let out = run_redistribution(&RedistributionInput {
            target_total: dec!(300),
            instruments: vec![
                InstrumentSpec::cash(dec!(100)),
                InstrumentSpec::boleto(dec!(400), 2, dec!(0.01)),
            ],
            tolerance: None,
        })
        .unwrap();
        assert_eq!(out.result.remaining_value, dec!(-100));
        assert_eq!(out.warnings.len(), 1);
    }
}
