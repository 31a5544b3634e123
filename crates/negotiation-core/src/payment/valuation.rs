//! Present value of a single payment instrument.
//!
//! | Kind      | Present value                                  |
//! |-----------|------------------------------------------------|
//! | Cash      | `face`                                         |
//! | Financing | `face / (1 + i)^n`                             |
//! | Card      | `face * (1 - deflation) * (1 - anticipation*n)` |
//! | Boleto    | `face / (1 + capital_cost)^n`                  |
//!
//! Any missing rate parameter values the instrument at face.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::payment::instrument::{InstrumentKind, InstrumentSpec, InstrumentTerms, PaymentInstrument};
use crate::payment::schedule::Installment;
use crate::time_value::{discount_compound, discount_percent};
use crate::types::*;
use crate::NegotiationResult;

/// Time-value-adjusted amount the seller effectively receives for `face_value`
/// paid under `terms`. Never negative.
pub fn present_value(face_value: Money, terms: &InstrumentTerms) -> Money {
    let pv = match terms {
        InstrumentTerms::Cash => face_value,
        InstrumentTerms::Financing {
            installments,
            monthly_interest_rate: Some(rate),
            ..
        } => discount_compound(face_value, *rate, *installments),
        InstrumentTerms::Boleto {
            installments,
            capital_cost_rate: Some(rate),
            ..
        } => discount_compound(face_value, *rate, *installments),
        InstrumentTerms::Card {
            installments,
            deflation_rate: Some(deflation),
            anticipation_rate: Some(anticipation),
        } => {
            let anticipation_factor = Decimal::ONE - *anticipation * Decimal::from(*installments);
            face_value * (Decimal::ONE - *deflation) * anticipation_factor
        }
        // Parameters missing: no discounting
        _ => face_value,
    };
    pv.max(Decimal::ZERO)
}

/// Valuation of one instrument, as exposed to the CLI and bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentValuation {
    pub kind: InstrumentKind,
    pub face_value: Money,
    pub present_value: Money,
    pub financial_cost: Money,
    /// Cost of the instrument as a percentage of its face value.
    pub cost_percent: Percent,
    pub installment_count: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub installments: Vec<Installment>,
}

/// Value a single instrument spec.
pub fn value_instrument(spec: &InstrumentSpec) -> NegotiationResult<ComputationOutput<InstrumentValuation>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let instrument = PaymentInstrument::from_spec(spec.id.clone().unwrap_or_default(), spec)?;

    if has_missing_rates(&spec.terms) {
        warnings.push(format!(
            "{} rate parameters incomplete; valued at face",
            instrument.kind()
        ));
    }
    if matches!(spec.terms, InstrumentTerms::Card { .. })
        && instrument.present_value().is_zero()
        && !spec.face_value.is_zero()
    {
        warnings.push("Card anticipation cost exceeds face value; present value floored at zero".into());
    }

    let output = InstrumentValuation {
        kind: instrument.kind(),
        face_value: instrument.face_value(),
        present_value: instrument.present_value(),
        financial_cost: instrument.financial_cost(),
        cost_percent: discount_percent(instrument.face_value(), instrument.present_value()),
        installment_count: instrument.installment_count(),
        installments: instrument.installments().to_vec(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Payment instrument present value (monthly compounding)",
        &spec.terms,
        warnings,
        elapsed,
        output,
    ))
}

fn has_missing_rates(terms: &InstrumentTerms) -> bool {
    match terms {
        InstrumentTerms::Cash => false,
        InstrumentTerms::Financing {
            monthly_interest_rate,
            ..
        } => monthly_interest_rate.is_none(),
        InstrumentTerms::Card {
            deflation_rate,
            anticipation_rate,
            ..
        } => deflation_rate.is_none() || anticipation_rate.is_none(),
        InstrumentTerms::Boleto {
            capital_cost_rate, ..
        } => capital_cost_rate.is_none(),
    }
}
