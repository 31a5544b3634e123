use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::negotiation::redistribution::instruments_from_specs;
use crate::payment::instrument::{InstrumentKind, InstrumentSpec, PaymentInstrument};
use crate::payment::schedule::{build_schedule, Installment};
use crate::time_value::add_months;
use crate::types::*;
use crate::NegotiationResult;

/// One dated receipt in the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub date: NaiveDate,
    pub instrument_id: String,
    pub kind: InstrumentKind,
    pub installment: u32,
    pub of: u32,
    pub value: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReceipts {
    /// `YYYY-MM`
    pub month: String,
    pub total: Money,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptTimeline {
    pub reference_date: NaiveDate,
    pub receipts: Vec<Receipt>,
    pub monthly: Vec<MonthlyReceipts>,
    pub total: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_receipt_date: Option<NaiveDate>,
}

/// Flatten instruments into dated receipts.
///
/// Cash lands on `reference_date`. Card installments arrive monthly from one
/// month after it. Boleto and financing use their own schedule when they have
/// one, otherwise an equal monthly split from one month after the reference.
/// Receipts are ordered by date; same-day receipts keep instrument order.
pub fn receipt_timeline(
    instruments: &[PaymentInstrument],
    reference_date: NaiveDate,
) -> NegotiationResult<ReceiptTimeline> {
    let mut receipts = Vec::new();

    for instrument in instruments {
        let schedule: Vec<Installment> = match instrument.kind() {
            InstrumentKind::Cash => vec![Installment {
                number: 1,
                date: reference_date,
                value: instrument.face_value(),
            }],
            _ if !instrument.installments().is_empty() => instrument.installments().to_vec(),
            _ => build_schedule(
                instrument.face_value(),
                instrument.installment_count(),
                add_months(reference_date, 1)?,
            )?,
        };
        let of = schedule.len() as u32;
        receipts.extend(schedule.into_iter().map(|inst| Receipt {
            date: inst.date,
            instrument_id: instrument.id().to_string(),
            kind: instrument.kind(),
            installment: inst.number,
            of,
            value: inst.value,
        }));
    }

    receipts.sort_by_key(|r| r.date);

    let mut by_month: BTreeMap<(i32, u32), (Money, usize)> = BTreeMap::new();
    for r in &receipts {
        let entry = by_month
            .entry((r.date.year(), r.date.month()))
            .or_insert((Decimal::ZERO, 0));
        entry.0 += r.value;
        entry.1 += 1;
    }
    let monthly = by_month
        .into_iter()
        .map(|((year, month), (total, count))| MonthlyReceipts {
            month: format!("{year:04}-{month:02}"),
            total,
            count,
        })
        .collect();

    Ok(ReceiptTimeline {
        reference_date,
        total: receipts.iter().map(|r| r.value).sum(),
        last_receipt_date: receipts.last().map(|r| r.date),
        receipts,
        monthly,
    })
}

/// Input for a standalone timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineInput {
    pub reference_date: NaiveDate,
    pub instruments: Vec<InstrumentSpec>,
}

pub fn run_timeline(input: &TimelineInput) -> NegotiationResult<ComputationOutput<ReceiptTimeline>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let instruments = instruments_from_specs(&input.instruments)?;
    let timeline = receipt_timeline(&instruments, input.reference_date)?;

    if let Some(early) = timeline.receipts.iter().find(|r| r.date < input.reference_date) {
        warnings.push(format!(
            "Installment {} of {} is dated before the reference date",
            early.installment, early.instrument_id
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Receipt timeline (cronograma de recebimento)",
        &serde_json::json!({
            "reference_date": input.reference_date,
            "instruments": input.instruments.len(),
        }),
        warnings,
        elapsed,
        timeline,
    ))
}
