use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{CeilingPolicy, NegotiationConfig};
use crate::error::NegotiationError;
use crate::negotiation::redistribution::{face_total, present_total, redistribute};
use crate::negotiation::solver::{solve_for_real_discount, SolverParams};
use crate::negotiation::summary::{summarize, KindSummary};
use crate::payment::instrument::{InstrumentSpec, PaymentInstrument};
use crate::time_value::{apply_discount, clamp_percent, discount_percent};
use crate::types::{Money, Percent};
use crate::NegotiationResult;

/// Which part of the negotiation an edit touches. Scalar fields are
/// debounced separately by a session; instrument mutations are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditField {
    GrossValue,
    DiscountPercent,
    NegotiatedValue,
    RealDiscountPercent,
    Instruments,
    Session,
}

impl EditField {
    /// Scalar fields are typed into by the user and worth debouncing.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            EditField::GrossValue
                | EditField::DiscountPercent
                | EditField::NegotiatedValue
                | EditField::RealDiscountPercent
        )
    }
}

impl std::fmt::Display for EditField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditField::GrossValue => write!(f, "gross value"),
            EditField::DiscountPercent => write!(f, "discount percent"),
            EditField::NegotiatedValue => write!(f, "negotiated value"),
            EditField::RealDiscountPercent => write!(f, "real discount percent"),
            EditField::Instruments => write!(f, "instruments"),
            EditField::Session => write!(f, "session"),
        }
    }
}

/// Non-fatal conditions reported alongside a committed edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditWarning {
    /// The input percentage was out of range; the clamped value was applied.
    PercentClamped {
        field: EditField,
        requested: Percent,
        applied: Percent,
    },
    /// The ceiling was exceeded under the `warn` policy.
    CeilingExceeded { projected: Percent, ceiling: Percent },
    SolverNotConverged {
        target: Percent,
        achieved: Percent,
        iterations: u32,
    },
    /// Part of a shortfall was dropped because the absorbing instrument hit zero.
    ShortfallNotAbsorbed { amount: Money },
    /// The locked real discount could not be held after this edit.
    LockNotHeld { locked_value: Percent, reason: String },
}

impl std::fmt::Display for EditWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditWarning::PercentClamped {
                field,
                requested,
                applied,
            } => write!(f, "{field} {requested}% out of range, clamped to {applied}%"),
            EditWarning::CeilingExceeded { projected, ceiling } => {
                write!(f, "projected real discount {projected}% exceeds ceiling {ceiling}%")
            }
            EditWarning::SolverNotConverged {
                target,
                achieved,
                iterations,
            } => write!(
                f,
                "real discount {target}% not reached after {iterations} iterations (best {achieved}%)"
            ),
            EditWarning::ShortfallNotAbsorbed { amount } => {
                write!(f, "shortfall of {amount} not absorbed by any payment form")
            }
            EditWarning::LockNotHeld {
                locked_value,
                reason,
            } => write!(f, "locked real discount {locked_value}% not held: {reason}"),
        }
    }
}

/// What a committed edit did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditOutcome {
    pub field: EditField,
    pub warnings: Vec<EditWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_iterations: Option<u32>,
}

/// A single user edit, as a value. Lets sessions queue edits and the CLI
/// replay an edit script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    GrossValue {
        value: Money,
    },
    DiscountPercent {
        percent: Percent,
    },
    NegotiatedValue {
        value: Money,
    },
    RealDiscountPercent {
        percent: Percent,
        #[serde(default)]
        lock: bool,
    },
    AddInstrument {
        spec: InstrumentSpec,
    },
    UpdateInstrument {
        id: String,
        spec: InstrumentSpec,
    },
    RemoveInstrument {
        id: String,
    },
    ToggleLock {
        id: String,
    },
    EditInstallment {
        id: String,
        number: u32,
        #[serde(default)]
        value: Option<Money>,
        #[serde(default)]
        date: Option<NaiveDate>,
    },
    UnlockRealDiscount,
    Reset {
        gross_value: Money,
    },
}

impl Edit {
    pub fn field(&self) -> EditField {
        match self {
            Edit::GrossValue { .. } => EditField::GrossValue,
            Edit::DiscountPercent { .. } => EditField::DiscountPercent,
            Edit::NegotiatedValue { .. } => EditField::NegotiatedValue,
            Edit::RealDiscountPercent { .. } | Edit::UnlockRealDiscount => {
                EditField::RealDiscountPercent
            }
            Edit::AddInstrument { .. }
            | Edit::UpdateInstrument { .. }
            | Edit::RemoveInstrument { .. }
            | Edit::ToggleLock { .. }
            | Edit::EditInstallment { .. } => EditField::Instruments,
            Edit::Reset { .. } => EditField::Session,
        }
    }
}

/// Projected real discount used by the ceiling check: value not yet
/// allocated to any instrument counts at face.
pub fn projected_real_discount(
    gross_value: Money,
    negotiated_value: Money,
    instruments: &[PaymentInstrument],
) -> Percent {
    let unallocated = (negotiated_value - face_total(instruments)).max(Decimal::ZERO);
    discount_percent(gross_value, present_total(instruments) + unallocated)
}

/// The negotiation calculator for one budget session.
///
/// The scalars and the instrument list are one unit of consistency: every
/// edit runs on a copy and is committed wholesale, so a failed edit leaves
/// the state untouched and no reader sees a half-recomputed state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NegotiationState {
    gross_value: Money,
    discount_percent: Percent,
    negotiated_value: Money,
    instruments: Vec<PaymentInstrument>,
    total_received: Money,
    real_discount_percent: Percent,
    remaining_value: Money,
    real_discount_locked: bool,
    locked_real_discount_value: Percent,
    real_discount_ceiling: Percent,
    #[serde(skip)]
    config: NegotiationConfig,
    #[serde(skip)]
    next_seq: u64,
}

impl Default for NegotiationState {
    fn default() -> Self {
        NegotiationState::new(NegotiationConfig::default())
    }
}

impl NegotiationState {
    /// Fresh state: every scalar zero, no instruments.
    pub fn new(config: NegotiationConfig) -> Self {
        Self {
            gross_value: Decimal::ZERO,
            discount_percent: Decimal::ZERO,
            negotiated_value: Decimal::ZERO,
            instruments: Vec::new(),
            total_received: Decimal::ZERO,
            real_discount_percent: Decimal::ZERO,
            remaining_value: Decimal::ZERO,
            real_discount_locked: false,
            locked_real_discount_value: Decimal::ZERO,
            real_discount_ceiling: config.real_discount_ceiling,
            config,
            next_seq: 0,
        }
    }

    /// Fresh state seeded with the room total; the negotiated value starts at gross.
    pub fn with_gross_value(gross_value: Money, config: NegotiationConfig) -> NegotiationResult<Self> {
        let mut state = NegotiationState::new(config);
        state.edit_gross_value(gross_value)?;
        Ok(state)
    }

    pub fn gross_value(&self) -> Money {
        self.gross_value
    }

    pub fn discount_percent(&self) -> Percent {
        self.discount_percent
    }

    pub fn negotiated_value(&self) -> Money {
        self.negotiated_value
    }

    pub fn instruments(&self) -> &[PaymentInstrument] {
        &self.instruments
    }

    pub fn instrument(&self, id: &str) -> Option<&PaymentInstrument> {
        self.instruments.iter().find(|i| i.id() == id)
    }

    pub fn total_received(&self) -> Money {
        self.total_received
    }

    pub fn real_discount_percent(&self) -> Percent {
        self.real_discount_percent
    }

    pub fn remaining_value(&self) -> Money {
        self.remaining_value
    }

    pub fn is_real_discount_locked(&self) -> bool {
        self.real_discount_locked
    }

    pub fn locked_real_discount_value(&self) -> Percent {
        self.locked_real_discount_value
    }

    pub fn real_discount_ceiling(&self) -> Percent {
        self.real_discount_ceiling
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    pub fn summary(&self) -> Vec<KindSummary> {
        summarize(&self.instruments)
    }

    pub fn set_real_discount_ceiling(&mut self, ceiling: Percent) {
        self.real_discount_ceiling = ceiling.max(Decimal::ZERO);
    }

    // -----------------------------------------------------------------------
    // Scalar edits
    // -----------------------------------------------------------------------

    /// New room total. A negotiated value that was never set independently
    /// follows the gross value; otherwise it stays and the discount shifts.
    pub fn edit_gross_value(&mut self, value: Money) -> NegotiationResult<EditOutcome> {
        check_money("gross_value", value)?;
        self.transact(EditField::GrossValue, |next, outcome| {
            let tracks_gross =
                next.negotiated_value.is_zero() || next.negotiated_value == next.gross_value;
            next.gross_value = value;
            if tracks_gross {
                next.negotiated_value = value;
            }
            if !next.hold_locked_real_discount(outcome)? {
                next.redistribute_to(next.negotiated_value, outcome)?;
            }
            next.recompute(false);
            Ok(())
        })
    }

    pub fn edit_discount_percent(&mut self, percent: Percent) -> NegotiationResult<EditOutcome> {
        self.ensure_real_discount_unlocked()?;
        self.transact(EditField::DiscountPercent, |next, outcome| {
            let applied =
                clamp_with_warning(EditField::DiscountPercent, percent, Decimal::ONE_HUNDRED, outcome);
            let target = apply_discount(next.gross_value, applied);
            next.redistribute_to(target, outcome)?;
            next.negotiated_value = target;
            next.discount_percent = applied;
            next.recompute(true);
            Ok(())
        })
    }

    /// With no instruments this is manual mode: the value is taken as is.
    pub fn edit_negotiated_value(&mut self, value: Money) -> NegotiationResult<EditOutcome> {
        check_money("negotiated_value", value)?;
        self.ensure_real_discount_unlocked()?;
        self.transact(EditField::NegotiatedValue, |next, outcome| {
            next.redistribute_to(value, outcome)?;
            next.negotiated_value = value;
            next.recompute(false);
            Ok(())
        })
    }

    /// Target a real discount. Without instruments real and nominal discount
    /// coincide (capped at `real_discount_cap`); with instruments the solver
    /// picks the negotiated value. `lock` pins the value against later edits.
    pub fn edit_real_discount_percent(
        &mut self,
        percent: Percent,
        lock: bool,
    ) -> NegotiationResult<EditOutcome> {
        self.transact(EditField::RealDiscountPercent, |next, outcome| {
            let applied = if next.instruments.is_empty() {
                let cap = next.config.real_discount_cap;
                let applied = clamp_with_warning(EditField::RealDiscountPercent, percent, cap, outcome);
                next.discount_percent = applied;
                next.negotiated_value = apply_discount(next.gross_value, applied);
                next.recompute(true);
                applied
            } else {
                let applied = clamp_with_warning(
                    EditField::RealDiscountPercent,
                    percent,
                    Decimal::ONE_HUNDRED,
                    outcome,
                );
                next.solve_and_apply(applied, outcome)?;
                next.recompute(false);
                applied
            };
            if lock || next.real_discount_locked {
                next.real_discount_locked = true;
                next.locked_real_discount_value = applied;
            }
            Ok(())
        })
    }

    pub fn unlock_real_discount(&mut self) -> EditOutcome {
        self.real_discount_locked = false;
        EditOutcome {
            field: EditField::RealDiscountPercent,
            warnings: Vec::new(),
            solver_iterations: None,
        }
    }

    // -----------------------------------------------------------------------
    // Instrument edits
    // -----------------------------------------------------------------------

    /// Append a payment form at its requested face value, subject to the
    /// real-discount ceiling.
    pub fn add_instrument(&mut self, spec: &InstrumentSpec) -> NegotiationResult<EditOutcome> {
        self.transact(EditField::Instruments, |next, outcome| {
            let id = match &spec.id {
                Some(id) => {
                    if next.instrument(id).is_some() {
                        return Err(NegotiationError::InvalidInput {
                            field: "id".into(),
                            reason: format!("Payment instrument {id} already exists"),
                        });
                    }
                    id.clone()
                }
                None => next.generate_id(spec),
            };
            let instrument = PaymentInstrument::from_spec(id, spec)?;
            next.instruments.push(instrument);
            next.check_ceiling(outcome)?;
            next.hold_locked_real_discount(outcome)?;
            next.recompute(false);
            Ok(())
        })
    }

    /// Replace an instrument's terms and face value; id and lock are kept.
    pub fn update_instrument(&mut self, id: &str, spec: &InstrumentSpec) -> NegotiationResult<EditOutcome> {
        self.transact(EditField::Instruments, |next, outcome| {
            next.instrument_mut(id)?.apply_spec(spec)?;
            next.check_ceiling(outcome)?;
            next.hold_locked_real_discount(outcome)?;
            next.recompute(false);
            Ok(())
        })
    }

    /// Edit one installment of a schedule; the face value follows the schedule.
    pub fn edit_installment(
        &mut self,
        id: &str,
        number: u32,
        value: Option<Money>,
        date: Option<NaiveDate>,
    ) -> NegotiationResult<EditOutcome> {
        self.transact(EditField::Instruments, |next, outcome| {
            next.instrument_mut(id)?.edit_installment(number, value, date)?;
            next.check_ceiling(outcome)?;
            next.recompute(false);
            next.report_lock_drift(outcome);
            Ok(())
        })
    }

    pub fn remove_instrument(&mut self, id: &str) -> NegotiationResult<EditOutcome> {
        self.transact(EditField::Instruments, |next, outcome| {
            let pos = next
                .instruments
                .iter()
                .position(|i| i.id() == id)
                .ok_or_else(|| NegotiationError::InstrumentNotFound(id.to_string()))?;
            next.instruments.remove(pos);
            next.hold_locked_real_discount(outcome)?;
            next.recompute(false);
            Ok(())
        })
    }

    /// Flip the lock flag; the face value is left alone.
    pub fn toggle_lock(&mut self, id: &str) -> NegotiationResult<EditOutcome> {
        self.transact(EditField::Instruments, |next, _| {
            let instrument = next.instrument_mut(id)?;
            let locked = !instrument.is_locked();
            instrument.set_locked(locked);
            next.recompute(false);
            Ok(())
        })
    }

    /// Discard the session and start over from a new room total.
    pub fn reset(&mut self, gross_value: Money) -> NegotiationResult<EditOutcome> {
        check_money("gross_value", gross_value)?;
        let mut fresh = NegotiationState::new(self.config.clone());
        fresh.real_discount_ceiling = self.real_discount_ceiling;
        fresh.edit_gross_value(gross_value)?;
        *self = fresh;
        Ok(EditOutcome {
            field: EditField::Session,
            warnings: Vec::new(),
            solver_iterations: None,
        })
    }

    /// Dispatch an [`Edit`] value to the matching operation.
    pub fn apply(&mut self, edit: &Edit) -> NegotiationResult<EditOutcome> {
        match edit {
            Edit::GrossValue { value } => self.edit_gross_value(*value),
            Edit::DiscountPercent { percent } => self.edit_discount_percent(*percent),
            Edit::NegotiatedValue { value } => self.edit_negotiated_value(*value),
            Edit::RealDiscountPercent { percent, lock } => {
                self.edit_real_discount_percent(*percent, *lock)
            }
            Edit::AddInstrument { spec } => self.add_instrument(spec),
            Edit::UpdateInstrument { id, spec } => self.update_instrument(id, spec),
            Edit::RemoveInstrument { id } => self.remove_instrument(id),
            Edit::ToggleLock { id } => self.toggle_lock(id),
            Edit::EditInstallment {
                id,
                number,
                value,
                date,
            } => self.edit_installment(id, *number, *value, *date),
            Edit::UnlockRealDiscount => Ok(self.unlock_real_discount()),
            Edit::Reset { gross_value } => self.reset(*gross_value),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Run `edit` against a copy and commit it only if it succeeds.
    fn transact<F>(&mut self, field: EditField, edit: F) -> NegotiationResult<EditOutcome>
    where
        F: FnOnce(&mut NegotiationState, &mut EditOutcome) -> NegotiationResult<()>,
    {
        let mut next = self.clone();
        let mut outcome = EditOutcome {
            field,
            warnings: Vec::new(),
            solver_iterations: None,
        };
        match edit(&mut next, &mut outcome) {
            Ok(()) => {
                *self = next;
                tracing::debug!(
                    %field,
                    negotiated = %self.negotiated_value,
                    real_discount = %self.real_discount_percent,
                    warnings = outcome.warnings.len(),
                    "edit committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(%field, code = e.code(), error = %e, "edit rejected");
                Err(e)
            }
        }
    }

    /// Derived fields, in dependency order. Present values are already
    /// current: instruments revalue whenever their face value changes.
    fn recompute(&mut self, discount_set_directly: bool) {
        let nominal = if discount_set_directly {
            self.discount_percent
        } else {
            discount_percent(self.gross_value, self.negotiated_value)
        };

        self.total_received = present_total(&self.instruments);
        self.real_discount_percent = if self.instruments.is_empty() {
            nominal
        } else if self.gross_value > Decimal::ZERO && self.total_received > Decimal::ZERO {
            discount_percent(self.gross_value, self.total_received)
        } else {
            Decimal::ZERO
        };
        self.remaining_value = self.negotiated_value - face_total(&self.instruments);
        self.discount_percent = nominal;
    }

    fn redistribute_to(&mut self, target: Money, outcome: &mut EditOutcome) -> NegotiationResult<()> {
        if self.instruments.is_empty() {
            return Ok(());
        }
        let result = redistribute(target, &self.instruments, self.config.redistribution_tolerance)?;
        if !result.unabsorbed.is_zero() {
            outcome.warnings.push(EditWarning::ShortfallNotAbsorbed {
                amount: -result.unabsorbed,
            });
        }
        self.instruments = result.instruments;
        Ok(())
    }

    fn solve_and_apply(&mut self, target: Percent, outcome: &mut EditOutcome) -> NegotiationResult<()> {
        let params = SolverParams::from(&self.config);
        let solution = solve_for_real_discount(target, self.gross_value, &self.instruments, &params)?;
        if !solution.converged {
            outcome.warnings.push(EditWarning::SolverNotConverged {
                target,
                achieved: solution.achieved_real_discount,
                iterations: solution.iterations,
            });
        }
        outcome.solver_iterations = Some(solution.iterations);
        self.negotiated_value = solution.negotiated_value;
        self.instruments = solution.instruments;
        Ok(())
    }

    /// Re-solve for the locked real discount. Returns whether the lock was held.
    /// Without instruments the lock is held by moving the negotiated value.
    fn hold_locked_real_discount(&mut self, outcome: &mut EditOutcome) -> NegotiationResult<bool> {
        if !self.real_discount_locked {
            return Ok(false);
        }
        let locked_value = self.locked_real_discount_value;
        if self.instruments.is_empty() {
            self.negotiated_value = apply_discount(self.gross_value, locked_value);
            return Ok(true);
        }
        match self.solve_and_apply(locked_value, outcome) {
            Ok(()) => Ok(true),
            Err(NegotiationError::CannotRedistribute { .. }) => {
                outcome.warnings.push(EditWarning::LockNotHeld {
                    locked_value,
                    reason: "every payment form is locked".into(),
                });
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Manual installment edits are not re-solved, since a re-solve would
    /// re-split the edited schedule. A lock they break is reported instead.
    fn report_lock_drift(&self, outcome: &mut EditOutcome) {
        if !self.real_discount_locked {
            return;
        }
        let drift = (self.real_discount_percent - self.locked_real_discount_value).abs();
        if drift >= self.config.solver_tolerance {
            outcome.warnings.push(EditWarning::LockNotHeld {
                locked_value: self.locked_real_discount_value,
                reason: format!(
                    "installment edit moved the real discount to {}%",
                    self.real_discount_percent.round_dp(4)
                ),
            });
        }
    }

    fn check_ceiling(&self, outcome: &mut EditOutcome) -> NegotiationResult<()> {
        let projected =
            projected_real_discount(self.gross_value, self.negotiated_value, &self.instruments);
        if projected <= self.real_discount_ceiling {
            return Ok(());
        }
        match self.config.ceiling_policy {
            CeilingPolicy::Block => Err(NegotiationError::DiscountCeilingExceeded {
                projected,
                ceiling: self.real_discount_ceiling,
            }),
            CeilingPolicy::Warn => {
                outcome.warnings.push(EditWarning::CeilingExceeded {
                    projected,
                    ceiling: self.real_discount_ceiling,
                });
                Ok(())
            }
        }
    }

    fn ensure_real_discount_unlocked(&self) -> NegotiationResult<()> {
        if self.real_discount_locked {
            return Err(NegotiationError::RealDiscountLocked {
                locked_value: self.locked_real_discount_value,
            });
        }
        Ok(())
    }

    fn instrument_mut(&mut self, id: &str) -> NegotiationResult<&mut PaymentInstrument> {
        self.instruments
            .iter_mut()
            .find(|i| i.id() == id)
            .ok_or_else(|| NegotiationError::InstrumentNotFound(id.to_string()))
    }

    fn generate_id(&mut self, spec: &InstrumentSpec) -> String {
        loop {
            self.next_seq += 1;
            let id = format!("{}-{}", spec.terms.kind().slug(), self.next_seq);
            if self.instrument(&id).is_none() {
                return id;
            }
        }
    }
}

fn check_money(field: &str, value: Money) -> NegotiationResult<()> {
    if value < Decimal::ZERO {
        return Err(NegotiationError::InvalidInput {
            field: field.into(),
            reason: "Value cannot be negative".into(),
        });
    }
    Ok(())
}

fn clamp_with_warning(
    field: EditField,
    requested: Percent,
    upper: Percent,
    outcome: &mut EditOutcome,
) -> Percent {
    let (applied, clamped) = clamp_percent(requested, Decimal::ZERO, upper);
    if clamped {
        outcome.warnings.push(EditWarning::PercentClamped {
            field,
            requested,
            applied,
        });
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn state(gross: Money) -> NegotiationState {
        NegotiationState::with_gross_value(gross, NegotiationConfig::default()).unwrap()
    }

    #[test]
    fn test_new_state_is_zeroed() {
        let s = NegotiationState::default();
        assert_eq!(s.gross_value(), Decimal::ZERO);
        assert_eq!(s.negotiated_value(), Decimal::ZERO);
        assert_eq!(s.real_discount_percent(), Decimal::ZERO);
        assert!(s.instruments().is_empty());
    }

    #[test]
    fn test_gross_value_seeds_negotiated_value() {
        let s = state(dec!(50000));
        assert_eq!(s.negotiated_value(), dec!(50000));
        assert_eq!(s.discount_percent(), Decimal::ZERO);
        assert_eq!(s.remaining_value(), dec!(50000));
    }

    #[test]
    fn test_gross_edit_follows_untouched_negotiated_value() {
        let mut s = state(dec!(50000));
        s.edit_gross_value(dec!(60000)).unwrap();
        assert_eq!(s.negotiated_value(), dec!(60000));
    }

    #[test]
    fn test_gross_edit_keeps_independent_negotiated_value() {
        let mut s = state(dec!(50000));
        s.edit_negotiated_value(dec!(45000)).unwrap();
        s.edit_gross_value(dec!(60000)).unwrap();
        assert_eq!(s.negotiated_value(), dec!(45000));
        assert_eq!(s.discount_percent(), dec!(25));
    }

    #[test]
    fn test_discount_percent_sets_negotiated_value() {
        let mut s = state(dec!(80000));
        s.edit_discount_percent(dec!(12.5)).unwrap();
        assert_eq!(s.negotiated_value(), dec!(70000));
        assert_eq!(s.discount_percent(), dec!(12.5));
        assert_eq!(s.real_discount_percent(), dec!(12.5));
    }

    #[test]
    fn test_discount_percent_clamped() {
        let mut s = state(dec!(1000));
        let outcome = s.edit_discount_percent(dec!(140)).unwrap();
        assert_eq!(s.discount_percent(), dec!(100));
        assert_eq!(s.negotiated_value(), Decimal::ZERO);
        assert!(matches!(
            outcome.warnings[0],
            EditWarning::PercentClamped { applied, .. } if applied == dec!(100)
        ));
    }

    #[test]
    fn test_real_discount_without_instruments_capped_at_fifty() {
        let mut s = state(dec!(1000));
        let outcome = s.edit_real_discount_percent(dec!(70), false).unwrap();
        assert_eq!(s.discount_percent(), dec!(50));
        assert_eq!(s.real_discount_percent(), dec!(50));
        assert_eq!(s.negotiated_value(), dec!(500));
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_real_discount_with_instruments_solves() {
        let mut s = state(dec!(100000));
        s.add_instrument(&InstrumentSpec::cash(dec!(100000))).unwrap();
        let outcome = s.edit_real_discount_percent(dec!(10), false).unwrap();
        assert!(outcome.solver_iterations.unwrap() <= 25);
        assert!((s.real_discount_percent() - dec!(10)).abs() < dec!(0.01));
        assert_eq!(s.discount_percent(), discount_percent(dec!(100000), s.negotiated_value()));
        assert!(s.remaining_value().abs() < dec!(0.01));
    }

    #[test]
    fn test_locked_real_discount_blocks_nominal_edits() {
        let mut s = state(dec!(1000));
        s.edit_real_discount_percent(dec!(10), true).unwrap();
        assert!(s.is_real_discount_locked());
        assert_eq!(s.locked_real_discount_value(), dec!(10));

        let err = s.edit_negotiated_value(dec!(800)).unwrap_err();
        assert_eq!(err.code(), "REAL_DISCOUNT_LOCKED");
        assert!(s.edit_discount_percent(dec!(5)).is_err());

        s.unlock_real_discount();
        s.edit_negotiated_value(dec!(800)).unwrap();
        assert_eq!(s.real_discount_percent(), dec!(20));
    }

    #[test]
    fn test_locked_real_discount_held_across_gross_edit() {
        let mut s = state(dec!(100000));
        s.add_instrument(&InstrumentSpec::cash(dec!(100000))).unwrap();
        s.edit_real_discount_percent(dec!(10), true).unwrap();

        s.edit_gross_value(dec!(120000)).unwrap();
        assert!((s.real_discount_percent() - dec!(10)).abs() < dec!(0.01));
        assert!((s.negotiated_value() - dec!(108000)).abs() < dec!(12));
    }

    #[test]
    fn test_locked_real_discount_held_across_gross_edit_without_instruments() {
        let mut s = state(dec!(1000));
        s.edit_real_discount_percent(dec!(10), true).unwrap();

        let outcome = s.edit_gross_value(dec!(2000)).unwrap();
        assert!(outcome.warnings.is_empty());
        assert!(s.is_real_discount_locked());
        assert_eq!(s.negotiated_value(), dec!(1800));
        assert_eq!(s.real_discount_percent(), dec!(10));
        assert_eq!(s.discount_percent(), dec!(10));
    }

    #[test]
    fn test_locked_real_discount_held_when_last_instrument_removed() {
        let mut s = state(dec!(10000));
        s.add_instrument(&InstrumentSpec::boleto(dec!(10000), 6, dec!(0.01)).with_id("b"))
            .unwrap();
        s.edit_real_discount_percent(dec!(10), true).unwrap();

        s.remove_instrument("b").unwrap();
        assert_eq!(s.negotiated_value(), dec!(9000));
        assert_eq!(s.real_discount_percent(), dec!(10));
    }

    #[test]
    fn test_installment_edit_reports_broken_lock() {
        let first = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();
        let mut s = state(dec!(10000));
        s.add_instrument(
            &InstrumentSpec::boleto(dec!(10000), 4, dec!(0.01))
                .first_due_on(first)
                .with_id("b"),
        )
        .unwrap();
        s.edit_real_discount_percent(dec!(5), true).unwrap();
        let before = s.real_discount_percent();
        assert!((before - dec!(5)).abs() < dec!(0.01));

        let outcome = s.edit_installment("b", 1, Some(dec!(100)), None).unwrap();
        assert!(s.is_real_discount_locked());
        assert!(s.real_discount_percent() > before);
        assert!(matches!(
            outcome.warnings.as_slice(),
            [EditWarning::LockNotHeld { locked_value, .. }] if *locked_value == dec!(5)
        ));
    }

    #[test]
    fn test_add_generates_ids_and_keeps_insertion_order() {
        let mut s = state(dec!(1000));
        s.add_instrument(&InstrumentSpec::card(dec!(100), 2, dec!(0.03), dec!(0.02))).unwrap();
        s.add_instrument(&InstrumentSpec::cash(dec!(100))).unwrap();
        let ids: Vec<&str> = s.instruments().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["card-1", "cash-2"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut s = state(dec!(1000));
        s.add_instrument(&InstrumentSpec::cash(dec!(100)).with_id("a")).unwrap();
        assert!(s.add_instrument(&InstrumentSpec::cash(dec!(100)).with_id("a")).is_err());
        assert_eq!(s.instruments().len(), 1);
    }

    #[test]
    fn test_ceiling_warn_policy_allows_add() {
        let config = NegotiationConfig::default().with_ceiling_policy(CeilingPolicy::Warn);
        let mut s = NegotiationState::with_gross_value(dec!(1000), config).unwrap();
        let outcome = s
            .add_instrument(&InstrumentSpec::financing(dec!(1000), 1, dec!(1)))
            .unwrap();
        assert_eq!(s.instruments().len(), 1);
        assert!(matches!(outcome.warnings[0], EditWarning::CeilingExceeded { .. }));
    }

    #[test]
    fn test_toggle_lock_keeps_face_value() {
        let mut s = state(dec!(1000));
        s.add_instrument(&InstrumentSpec::cash(dec!(400)).with_id("c")).unwrap();
        s.toggle_lock("c").unwrap();
        assert!(s.instrument("c").unwrap().is_locked());
        assert_eq!(s.instrument("c").unwrap().face_value(), dec!(400));
        s.toggle_lock("c").unwrap();
        assert!(!s.instrument("c").unwrap().is_locked());
    }

    #[test]
    fn test_failed_edit_leaves_state_untouched() {
        let mut s = state(dec!(1000));
        s.add_instrument(&InstrumentSpec::cash(dec!(1000)).locked()).unwrap();
        let before = s.clone();
        let err = s.edit_negotiated_value(dec!(900)).unwrap_err();
        assert_eq!(err.code(), "CANNOT_REDISTRIBUTE");
        assert_eq!(s, before);
    }

    #[test]
    fn test_remove_missing_instrument() {
        let mut s = state(dec!(1000));
        let err = s.remove_instrument("nope").unwrap_err();
        assert_eq!(err, NegotiationError::InstrumentNotFound("nope".into()));
    }

    #[test]
    fn test_negative_values_rejected() {
        let mut s = state(dec!(1000));
        assert!(s.edit_gross_value(dec!(-1)).is_err());
        assert!(s.edit_negotiated_value(dec!(-1)).is_err());
    }

    #[test]
    fn test_zero_gross_yields_zero_percentages() {
        let mut s = state(Decimal::ZERO);
        s.add_instrument(&InstrumentSpec::cash(dec!(100))).unwrap();
        assert_eq!(s.discount_percent(), Decimal::ZERO);
        assert_eq!(s.real_discount_percent(), Decimal::ZERO);
    }

    #[test]
    fn test_reset_keeps_config_and_ceiling() {
        let mut s = state(dec!(1000));
        s.set_real_discount_ceiling(dec!(10));
        s.add_instrument(&InstrumentSpec::cash(dec!(1000))).unwrap();
        s.reset(dec!(2000)).unwrap();
        assert!(s.instruments().is_empty());
        assert_eq!(s.negotiated_value(), dec!(2000));
        assert_eq!(s.real_discount_ceiling(), dec!(10));
    }

    #[test]
    fn test_apply_dispatches_edit_values() {
        let mut s = state(dec!(1000));
        let edit: Edit = serde_json::from_str(r#"{"op": "discount_percent", "percent": "10"}"#).unwrap();
        assert_eq!(edit.field(), EditField::DiscountPercent);
        s.apply(&edit).unwrap();
        assert_eq!(s.negotiated_value(), dec!(900));
    }

    #[test]
    fn test_projected_real_discount_counts_unallocated_at_face() {
        let s = state(dec!(50000));
        let insts = vec![PaymentInstrument::from_spec("c", &InstrumentSpec::cash(dec!(20000))).unwrap()];
        assert_eq!(
            projected_real_discount(s.gross_value(), s.negotiated_value(), &insts),
            Decimal::ZERO
        );
    }
}
