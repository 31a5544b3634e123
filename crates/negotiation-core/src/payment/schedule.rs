use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::NegotiationError;
use crate::time_value::{add_months, round_money};
use crate::types::*;
use crate::NegotiationResult;

/// One dated installment of a boleto or financing schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub number: u32,
    pub date: NaiveDate,
    pub value: Money,
}

/// Input for an equal-split schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub face_value: Money,
    pub installments: u32,
    pub first_due_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutput {
    pub installments: Vec<Installment>,
    pub total: Money,
    pub last_due_date: NaiveDate,
}

/// Split `face_value` into `count` monthly installments starting at
/// `first_due_date`.
///
/// Each value is rounded to cents and the rounding remainder lands on the last
/// installment, so the schedule always sums to `face_value` exactly. Dates are
/// offset from the first due date, not chained, so a 31st does not drift to
/// the 28th after February.
pub fn build_schedule(
    face_value: Money,
    count: u32,
    first_due_date: NaiveDate,
) -> NegotiationResult<Vec<Installment>> {
    if count == 0 {
        return Err(NegotiationError::InvalidInput {
            field: "installments".into(),
            reason: "Schedule requires at least one installment".into(),
        });
    }
    if face_value < Decimal::ZERO {
        return Err(NegotiationError::InvalidInput {
            field: "face_value".into(),
            reason: "Face value cannot be negative".into(),
        });
    }

    let base = round_money(face_value / Decimal::from(count));
    let mut schedule = Vec::with_capacity(count as usize);
    let mut allocated = Decimal::ZERO;

    for k in 0..count {
        let date = add_months(first_due_date, k)?;
        let value = if k + 1 == count {
            face_value - allocated
        } else {
            base
        };
        allocated += value;
        schedule.push(Installment {
            number: k + 1,
            date,
            value,
        });
    }

    Ok(schedule)
}

pub fn schedule_total(schedule: &[Installment]) -> Money {
    schedule.iter().map(|i| i.value).sum()
}

/// Build an equal-split schedule wrapped in the standard output envelope.
pub fn generate_schedule(input: &ScheduleInput) -> NegotiationResult<ComputationOutput<ScheduleOutput>> {
    let start = Instant::now();
    let installments = build_schedule(input.face_value, input.installments, input.first_due_date)?;

    let mut warnings = Vec::new();
    if let (Some(first), Some(last)) = (installments.first(), installments.last()) {
        if first.value != last.value {
            warnings.push(format!(
                "Rounding remainder of {} assigned to installment {}",
                last.value - first.value,
                last.number
            ));
        }
    }

    let output = ScheduleOutput {
        total: schedule_total(&installments),
        last_due_date: installments
            .last()
            .map(|i| i.date)
            .unwrap_or(input.first_due_date),
        installments,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Equal-split monthly installment schedule",
        &serde_json::json!({
            "face_value": input.face_value.to_string(),
            "installments": input.installments,
            "first_due_date": input.first_due_date,
            "remainder_policy": "last installment",
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

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_even_split() {
        let sched = build_schedule(dec!(1200), 4, date(2025, 3, 5)).unwrap();
        assert_eq!(sched.len(), 4);
        for inst in &sched {
            assert_eq!(inst.value, dec!(300));
        }
        assert_eq!(sched[3].date, date(2025, 6, 5));
    }

    #[test]
    fn test_remainder_goes_to_last() {
        let sched = build_schedule(dec!(100), 3, date(2025, 1, 15)).unwrap();
        assert_eq!(sched[0].value, dec!(33.33));
        assert_eq!(sched[1].value, dec!(33.33));
        assert_eq!(sched[2].value, dec!(33.34));
        assert_eq!(schedule_total(&sched), dec!(100));
    }

    #[test]
    fn test_month_end_does_not_drift() {
        let sched = build_schedule(dec!(300), 3, date(2025, 1, 31)).unwrap();
        assert_eq!(sched[1].date, date(2025, 2, 28));
        assert_eq!(sched[2].date, date(2025, 3, 31));
    }

    #[test]
    fn test_year_rollover() {
        let sched = build_schedule(dec!(200), 2, date(2025, 12, 10)).unwrap();
        assert_eq!(sched[1].date, date(2026, 1, 10));
    }

    #[test]
    fn test_zero_count_error() {
        assert!(build_schedule(dec!(100), 0, date(2025, 1, 1)).is_err());
    }

    #[test]
    fn test_generate_schedule_reports_remainder() {
        let out = generate_schedule(&ScheduleInput {
            face_value: dec!(100),
            installments: 3,
            first_due_date: date(2025, 1, 15),
        })
        .unwrap();
        assert_eq!(out.result.total, dec!(100));
        assert_eq!(out.result.last_due_date, date(2025, 3, 15));
        assert_eq!(out.warnings.len(), 1);
    }
}
