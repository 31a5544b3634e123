use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

use crate::error::NegotiationError;
use crate::types::{Money, Percent, Rate};
use crate::NegotiationResult;

/// Discount `amount` over `periods` compounding periods at `rate` per period:
/// `amount / (1 + rate)^periods`.
///
/// A rate at or below -100% has no meaningful discount factor; the amount is
/// returned undiscounted. A growth factor too large for `Decimal` discounts
/// the amount to zero.
pub fn discount_compound(amount: Money, rate: Rate, periods: u32) -> Money {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return amount;
    }
    match one_plus_r.checked_powu(periods as u64) {
        Some(factor) if !factor.is_zero() => amount / factor,
        None if one_plus_r > Decimal::ONE => Decimal::ZERO,
        _ => amount,
    }
}

/// Discount of `value` against `gross` in percent: `(gross - value) / gross * 100`.
/// Returns zero when `gross <= 0`.
pub fn discount_percent(gross: Money, value: Money) -> Percent {
    if gross <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (gross - value) / gross * Decimal::ONE_HUNDRED
}

/// Value left after taking `percent` off `gross`.
pub fn apply_discount(gross: Money, percent: Percent) -> Money {
    gross * (Decimal::ONE - percent / Decimal::ONE_HUNDRED)
}

/// Clamp a percentage into `[lo, hi]`. The flag reports whether clamping happened.
pub fn clamp_percent(value: Percent, lo: Percent, hi: Percent) -> (Percent, bool) {
    if value < lo {
        (lo, true)
    } else if value > hi {
        (hi, true)
    } else {
        (value, false)
    }
}

/// Round a money amount to cents.
pub fn round_money(amount: Money) -> Money {
    amount.round_dp(2)
}

/// Date `months` calendar months after `start`; day-of-month clamps to the
/// end of shorter months.
pub fn add_months(start: NaiveDate, months: u32) -> NegotiationResult<NaiveDate> {
    start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| NegotiationError::DateError(format!("{start} + {months} months overflows")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_discount_compound_basic() {
        // 1000 / 1.02^12 ≈ 788.49
        let result = discount_compound(dec!(1000), dec!(0.02), 12);
        assert!((result - dec!(788.49)).abs() < dec!(0.01));
    }

    #[test]
    fn test_discount_compound_zero_periods() {
        assert_eq!(discount_compound(dec!(1000), dec!(0.05), 0), dec!(1000));
    }

    #[test]
    fn test_discount_compound_degenerate_rate() {
        assert_eq!(discount_compound(dec!(1000), dec!(-1), 3), dec!(1000));
    }

    #[test]
    fn test_discount_compound_overflowing_factor_is_zero() {
        // 2^95 still fits in a Decimal, 2^96 does not
        let last_representable = discount_compound(dec!(1000), dec!(1), 95);
        assert!(last_representable > Decimal::ZERO);
        assert!(last_representable < dec!(0.0000000001));
        assert_eq!(discount_compound(dec!(1000), dec!(1), 96), Decimal::ZERO);
        assert_eq!(discount_compound(dec!(1000), dec!(1), 500), Decimal::ZERO);
    }

    #[test]
    fn test_discount_percent_guards_zero_gross() {
        assert_eq!(discount_percent(Decimal::ZERO, dec!(100)), Decimal::ZERO);
        assert_eq!(discount_percent(dec!(-5), dec!(100)), Decimal::ZERO);
    }

    #[test]
    fn test_discount_percent_basic() {
        assert_eq!(discount_percent(dec!(50000), dec!(45000)), dec!(10));
    }

    #[test]
    fn test_apply_discount() {
        assert_eq!(apply_discount(dec!(80000), dec!(12.5)), dec!(70000));
    }

    #[test]
    fn test_clamp_percent() {
        assert_eq!(clamp_percent(dec!(120), dec!(0), dec!(100)), (dec!(100), true));
        assert_eq!(clamp_percent(dec!(-3), dec!(0), dec!(50)), (dec!(0), true));
        assert_eq!(clamp_percent(dec!(7), dec!(0), dec!(50)), (dec!(7), false));
    }

    #[test]
    fn test_add_months_clamps_day() {
        let jan31 = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(add_months(jan31, 1).unwrap(), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(add_months(jan31, 2).unwrap(), NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
    }
}
