//! Conversions between decimal amounts and the integer cents kept in SQLite.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{AppError, Result};

/// Two decimal places, as for KES.
pub const CURRENCY_SCALE: u32 = 2;

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, CURRENCY_SCALE)
}

/// Rejects amounts with more than two decimal places rather than rounding them.
pub fn to_cents(amount: Decimal) -> Result<i64> {
    if amount.normalize().scale() > CURRENCY_SCALE {
        return Err(AppError::BadRequest(format!(
            "Amount {} has more than {} decimal places",
            amount, CURRENCY_SCALE
        )));
    }

    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| out_of_range(amount))
}

pub fn out_of_range(amount: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Amount {} is out of range", amount))
}

/// A chargeable amount: strictly positive, at most two decimal places.
pub fn validate_charge_amount(amount: Decimal) -> Result<i64> {
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest("Amount must be greater than zero".to_string()));
    }
    to_cents(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cents_conversion() {
        assert_eq!(to_cents(Decimal::from(150)).unwrap(), 15000);
        assert_eq!(to_cents(Decimal::from_str("19.99").unwrap()).unwrap(), 1999);
        assert_eq!(to_cents(Decimal::from_str("2.500").unwrap()).unwrap(), 250);
        assert_eq!(from_cents(30000), Decimal::from(300));
        assert_eq!(from_cents(1999).to_string(), "19.99");
    }

    #[test]
    fn test_rejects_sub_cent_precision() {
        assert!(matches!(
            to_cents(Decimal::from_str("1.005").unwrap()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_charge_amount_must_be_positive() {
        assert!(validate_charge_amount(Decimal::ZERO).is_err());
        assert!(validate_charge_amount(Decimal::from(-5)).is_err());
        assert_eq!(validate_charge_amount(Decimal::from(300)).unwrap(), 30000);
    }

    #[test]
    fn test_huge_amounts_are_rejected() {
        let huge = Decimal::from_scientific("1e27").unwrap();
        assert!(matches!(validate_charge_amount(huge), Err(AppError::BadRequest(_))));
        assert!(matches!(to_cents(Decimal::MAX), Err(AppError::BadRequest(_))));
        // Fits in Decimal but not in i64 cents
        let beyond_i64 = Decimal::from(i64::MAX);
        assert!(matches!(to_cents(beyond_i64), Err(AppError::BadRequest(_))));
    }
}
