use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::payment::instrument::{InstrumentKind, PaymentInstrument};
use crate::types::{Money, Percent};

/// Totals for one payment kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindSummary {
    pub kind: InstrumentKind,
    pub count: usize,
    pub face_total: Money,
    pub present_total: Money,
    pub financial_cost: Money,
    /// Share of the total face value carried by this kind.
    pub share_percent: Percent,
}

/// Per-kind totals in redistribution priority order; kinds with no
/// instrument are left out.
pub fn summarize(instruments: &[PaymentInstrument]) -> Vec<KindSummary> {
    let grand_face: Money = instruments.iter().map(|i| i.face_value()).sum();

    InstrumentKind::ALL
        .iter()
        .filter_map(|&kind| {
            let of_kind: Vec<&PaymentInstrument> =
                instruments.iter().filter(|i| i.kind() == kind).collect();
            if of_kind.is_empty() {
                return None;
            }
            let face_total: Money = of_kind.iter().map(|i| i.face_value()).sum();
            let present_total: Money = of_kind.iter().map(|i| i.present_value()).sum();
            let share_percent = if grand_face > Decimal::ZERO {
                face_total / grand_face * Decimal::ONE_HUNDRED
            } else {
                Decimal::ZERO
            };
            Some(KindSummary {
                kind,
                count: of_kind.len(),
                face_total,
                present_total,
                financial_cost: face_total - present_total,
                share_percent,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::redistribution::instruments_from_specs;
    use crate::payment::instrument::InstrumentSpec;
    use rust_decimal_macros::dec;

    #[test]
    fn test_summary_groups_by_kind_in_priority_order() {
        let insts = instruments_from_specs(&[
            InstrumentSpec::card(dec!(1000), 3, dec!(0.05), dec!(0.0199)),
            InstrumentSpec::cash(dec!(500)),
            InstrumentSpec::cash(dec!(1500)),
        ])
        .unwrap();
        let summary = summarize(&insts);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].kind, InstrumentKind::Cash);
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[0].face_total, dec!(2000));
        assert_eq!(summary[0].financial_cost, Decimal::ZERO);
        assert_eq!(summary[1].kind, InstrumentKind::Card);
        assert!((summary[1].financial_cost - dec!(106.715)).abs() < dec!(0.001));
        assert!((summary[0].share_percent - dec!(66.6667)).abs() < dec!(0.001));
    }

    #[test]
    fn test_empty_summary() {
        assert!(summarize(&[]).is_empty());
    }
}
