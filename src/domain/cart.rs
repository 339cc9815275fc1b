use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::money,
    error::{AppError, Result},
};

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i64 = 10_000;

/// One (owner, product) association. Prices are never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with the live catalog entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineDetails {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    pub quantity: i64,
    pub image_url: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub line_total: Decimal,
}

impl CartLineDetails {
    pub fn new(
        id: Uuid,
        product_id: Uuid,
        name: String,
        price: Decimal,
        quantity: i64,
        image_url: String,
    ) -> Result<Self> {
        let line_total = price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| money::out_of_range(format!("{} x {}", price, quantity)))?;

        Ok(Self {
            id,
            product_id,
            name,
            price,
            quantity,
            image_url,
            line_total,
        })
    }
}

/// Sum of price × quantity over the lines.
pub fn cart_total(lines: &[CartLineDetails]) -> Result<Decimal> {
    lines.iter().try_fold(Decimal::ZERO, |total, line| {
        total
            .checked_add(line.line_total)
            .ok_or_else(|| money::out_of_range("cart total"))
    })
}

/// Units across all lines.
pub fn item_count(lines: &[CartLineDetails]) -> Result<i64> {
    lines.iter().try_fold(0i64, |count, line| {
        count
            .checked_add(line.quantity)
            .ok_or_else(|| AppError::BadRequest("Cart item count is out of range".to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn line(price: &str, quantity: i64) -> CartLineDetails {
        details(Decimal::from_str(price).unwrap(), quantity).unwrap()
    }

    fn details(price: Decimal, quantity: i64) -> Result<CartLineDetails> {
        CartLineDetails::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Item".to_string(),
            price,
            quantity,
            String::new(),
        )
    }

    #[test]
    fn test_cart_total() {
        assert_eq!(cart_total(&[]).unwrap(), Decimal::ZERO);
        let lines = vec![line("150", 2), line("19.99", 3)];
        assert_eq!(cart_total(&lines).unwrap(), Decimal::from_str("359.97").unwrap());
        assert_eq!(item_count(&lines).unwrap(), 5);
    }

    #[test]
    fn test_line_total_overflow_is_an_error() {
        let price = Decimal::from_scientific("1e27").unwrap();
        let result = details(price, 100_000_000_000_000_000);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_cart_total_overflow_is_an_error() {
        let big = details(Decimal::MAX, 1).unwrap();
        let result = cart_total(&[big.clone(), big]);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_item_count_overflow_is_an_error() {
        let lines = vec![line("1", i64::MAX), line("0", 1)];
        assert!(matches!(item_count(&lines), Err(AppError::BadRequest(_))));
    }
}
