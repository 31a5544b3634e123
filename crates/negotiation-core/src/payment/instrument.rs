use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::NegotiationError;
use crate::payment::schedule::{self, Installment};
use crate::payment::valuation::present_value;
use crate::types::{Money, Rate};
use crate::NegotiationResult;

/// Payment form. Declaration order is the redistribution priority: cash
/// absorbs a shortfall first, card last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentKind {
    Cash,
    Boleto,
    Financing,
    Card,
}

impl InstrumentKind {
    pub const ALL: [InstrumentKind; 4] = [
        InstrumentKind::Cash,
        InstrumentKind::Boleto,
        InstrumentKind::Financing,
        InstrumentKind::Card,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            InstrumentKind::Cash => "cash",
            InstrumentKind::Boleto => "boleto",
            InstrumentKind::Financing => "financing",
            InstrumentKind::Card => "card",
        }
    }
}

impl std::fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentKind::Cash => write!(f, "Cash"),
            InstrumentKind::Boleto => write!(f, "Boleto"),
            InstrumentKind::Financing => write!(f, "Financing"),
            InstrumentKind::Card => write!(f, "Card"),
        }
    }
}

/// Kind-specific terms. Rates are monthly fractions (0.02 = 2%); a missing
/// rate means the instrument is valued at face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentTerms {
    Cash,
    Financing {
        installments: u32,
        monthly_interest_rate: Option<Rate>,
        first_due_date: Option<NaiveDate>,
    },
    Card {
        installments: u32,
        deflation_rate: Option<Rate>,
        anticipation_rate: Option<Rate>,
    },
    Boleto {
        installments: u32,
        capital_cost_rate: Option<Rate>,
        first_due_date: Option<NaiveDate>,
    },
}

impl InstrumentTerms {
    pub fn kind(&self) -> InstrumentKind {
        match self {
            InstrumentTerms::Cash => InstrumentKind::Cash,
            InstrumentTerms::Financing { .. } => InstrumentKind::Financing,
            InstrumentTerms::Card { .. } => InstrumentKind::Card,
            InstrumentTerms::Boleto { .. } => InstrumentKind::Boleto,
        }
    }

    /// Number of installments; cash is always a single payment.
    pub fn installment_count(&self) -> u32 {
        match self {
            InstrumentTerms::Cash => 1,
            InstrumentTerms::Financing { installments, .. }
            | InstrumentTerms::Card { installments, .. }
            | InstrumentTerms::Boleto { installments, .. } => *installments,
        }
    }

    /// First due date for schedule-bearing kinds, when the form supplied one.
    pub fn first_due_date(&self) -> Option<NaiveDate> {
        match self {
            InstrumentTerms::Financing { first_due_date, .. }
            | InstrumentTerms::Boleto { first_due_date, .. } => *first_due_date,
            _ => None,
        }
    }

    fn validate(&self) -> NegotiationResult<()> {
        if self.installment_count() == 0 {
            return Err(NegotiationError::InvalidInput {
                field: "installments".into(),
                reason: format!("{} requires at least one installment", self.kind()),
            });
        }
        let rates: Vec<(&str, Option<Rate>)> = match self {
            InstrumentTerms::Cash => Vec::new(),
            InstrumentTerms::Financing {
                monthly_interest_rate,
                ..
            } => vec![("monthly_interest_rate", *monthly_interest_rate)],
            InstrumentTerms::Card {
                deflation_rate,
                anticipation_rate,
                ..
            } => vec![
                ("deflation_rate", *deflation_rate),
                ("anticipation_rate", *anticipation_rate),
            ],
            InstrumentTerms::Boleto {
                capital_cost_rate, ..
            } => vec![("capital_cost_rate", *capital_cost_rate)],
        };
        for (field, rate) in rates {
            if let Some(r) = rate {
                if r < Decimal::ZERO {
                    return Err(NegotiationError::InvalidInput {
                        field: field.into(),
                        reason: "Rate cannot be negative".into(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Creation / edit payload coming from the payment forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub face_value: Money,
    pub terms: InstrumentTerms,
    #[serde(default)]
    pub locked: bool,
}

impl InstrumentSpec {
    pub fn cash(face_value: Money) -> Self {
        Self {
            id: None,
            face_value,
            terms: InstrumentTerms::Cash,
            locked: false,
        }
    }

    pub fn financing(face_value: Money, installments: u32, monthly_interest_rate: Rate) -> Self {
        Self {
            id: None,
            face_value,
            terms: InstrumentTerms::Financing {
                installments,
                monthly_interest_rate: Some(monthly_interest_rate),
                first_due_date: None,
            },
            locked: false,
        }
    }

    pub fn card(face_value: Money, installments: u32, deflation_rate: Rate, anticipation_rate: Rate) -> Self {
        Self {
            id: None,
            face_value,
            terms: InstrumentTerms::Card {
                installments,
                deflation_rate: Some(deflation_rate),
                anticipation_rate: Some(anticipation_rate),
            },
            locked: false,
        }
    }

    pub fn boleto(face_value: Money, installments: u32, capital_cost_rate: Rate) -> Self {
        Self {
            id: None,
            face_value,
            terms: InstrumentTerms::Boleto {
                installments,
                capital_cost_rate: Some(capital_cost_rate),
                first_due_date: None,
            },
            locked: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Attach a first due date so a schedule is generated (boleto/financing only).
    pub fn first_due_on(mut self, date: NaiveDate) -> Self {
        match &mut self.terms {
            InstrumentTerms::Financing { first_due_date, .. }
            | InstrumentTerms::Boleto { first_due_date, .. } => *first_due_date = Some(date),
            _ => {}
        }
        self
    }
}

/// A payment instrument inside a negotiation.
///
/// `present_value` is always derived from `face_value` and the terms; the
/// only way to change either goes through methods that revalue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentInstrument {
    id: String,
    kind: InstrumentKind,
    face_value: Money,
    present_value: Money,
    terms: InstrumentTerms,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    installments: Vec<Installment>,
    locked: bool,
}

impl PaymentInstrument {
    pub fn from_spec(id: impl Into<String>, spec: &InstrumentSpec) -> NegotiationResult<Self> {
        check_face_value(spec.face_value)?;
        spec.terms.validate()?;

        let mut instrument = Self {
            id: id.into(),
            kind: spec.terms.kind(),
            face_value: spec.face_value,
            present_value: Decimal::ZERO,
            terms: spec.terms.clone(),
            installments: Vec::new(),
            locked: spec.locked,
        };
        instrument.rebuild_schedule()?;
        instrument.revalue();
        Ok(instrument)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    pub fn face_value(&self) -> Money {
        self.face_value
    }

    pub fn present_value(&self) -> Money {
        self.present_value
    }

    pub fn terms(&self) -> &InstrumentTerms {
        &self.terms
    }

    pub fn installment_count(&self) -> u32 {
        self.terms.installment_count()
    }

    pub fn installments(&self) -> &[Installment] {
        &self.installments
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Financial cost carried by this form: `face - present`.
    pub fn financial_cost(&self) -> Money {
        self.face_value - self.present_value
    }

    pub(crate) fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Change the face value. An existing schedule is re-split evenly from its
    /// first due date so the installments keep summing to the face value.
    pub fn set_face_value(&mut self, face_value: Money) -> NegotiationResult<()> {
        check_face_value(face_value)?;
        self.face_value = face_value;
        self.rebuild_schedule()?;
        self.revalue();
        Ok(())
    }

    /// Replace terms and face value, keeping identity and lock state.
    pub fn apply_spec(&mut self, spec: &InstrumentSpec) -> NegotiationResult<()> {
        let locked = self.locked;
        let mut next = PaymentInstrument::from_spec(self.id.clone(), spec)?;
        next.locked = locked;
        *self = next;
        Ok(())
    }

    /// Edit one installment; the schedule becomes authoritative and the face
    /// value is re-derived from it.
    pub fn edit_installment(
        &mut self,
        number: u32,
        value: Option<Money>,
        date: Option<NaiveDate>,
    ) -> NegotiationResult<()> {
        let installment = self
            .installments
            .iter_mut()
            .find(|i| i.number == number)
            .ok_or_else(|| NegotiationError::InstallmentNotFound {
                instrument: self.id.clone(),
                number,
            })?;
        if let Some(v) = value {
            if v < Decimal::ZERO {
                return Err(NegotiationError::InvalidInput {
                    field: "value".into(),
                    reason: "Installment value cannot be negative".into(),
                });
            }
            installment.value = v;
        }
        if let Some(d) = date {
            installment.date = d;
        }
        self.face_value = schedule::schedule_total(&self.installments);
        self.revalue();
        Ok(())
    }

    fn rebuild_schedule(&mut self) -> NegotiationResult<()> {
        let first = self
            .installments
            .first()
            .map(|i| i.date)
            .or_else(|| self.terms.first_due_date());
        self.installments = match first {
            Some(date) => schedule::build_schedule(self.face_value, self.installment_count(), date)?,
            None => Vec::new(),
        };
        Ok(())
    }

    fn revalue(&mut self) {
        self.present_value = present_value(self.face_value, &self.terms);
    }
}

fn check_face_value(face_value: Money) -> NegotiationResult<()> {
    if face_value < Decimal::ZERO {
        return Err(NegotiationError::InvalidInput {
            field: "face_value".into(),
            reason: "Face value cannot be negative".into(),
        });
    }
    Ok(())
}
