use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// One STK push attempt and its outcome. Kept forever as an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MpesaPayment {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub response_code: String,
    pub response_description: String,
    pub customer_message: String,
    pub phone_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub result_code: Option<i64>,
    pub mpesa_receipt_number: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `Pending` is the only initial state. The provider moves it to `Success`
/// or `Failed` once; an administrator moves it to `Cleared`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Cleared,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Success => "Success",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cleared => "Cleared",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(PaymentStatus::Pending),
            "Success" => Some(PaymentStatus::Success),
            "Failed" => Some(PaymentStatus::Failed),
            "Cleared" => Some(PaymentStatus::Cleared),
            _ => None,
        }
    }

    /// Daraja reports success with result code 0 and anything else as failure.
    pub fn from_result_code(result_code: i64) -> Self {
        if result_code == 0 {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failed
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields persisted when the provider accepts an STK push.
#[derive(Debug, Clone)]
pub struct NewMpesaPayment {
    pub user_id: Option<Uuid>,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub response_code: String,
    pub response_description: String,
    pub customer_message: String,
    pub phone_number: String,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub result_code: Option<i64>,
}

/// A terminal provider outcome for one checkout request.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentResolution {
    pub checkout_request_id: String,
    pub result_code: i64,
    pub message: String,
    pub mpesa_receipt_number: Option<String>,
}

impl PaymentResolution {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from_result_code(self.result_code)
    }
}

/// What `status(trackingId)` hands back to a polling client.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentStatusView {
    pub status: PaymentStatus,
    pub message: String,
}

impl PaymentStatusView {
    pub fn pending() -> Self {
        Self {
            status: PaymentStatus::Pending,
            message: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUser {
    pub username: String,
    pub email: String,
}

/// Payment row joined with its owner, for the back office.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWithUser {
    #[serde(flatten)]
    pub payment: MpesaPayment,
    pub user: Option<PaymentUser>,
}

/// A Safaricom MSISDN in international form without the plus, e.g. `254712345678`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Accepts `0712345678`, `712345678`, `254712345678` and `+254712345678`,
    /// with optional spaces or dashes. Only mobile prefixes 7 and 1 are valid.
    pub fn parse(input: &str) -> Result<Self> {
        let cleaned: String = input
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid_phone(input));
        }

        let subscriber = match digits.len() {
            9 => digits,
            10 if digits.starts_with('0') => &digits[1..],
            12 if digits.starts_with("254") => &digits[3..],
            _ => return Err(invalid_phone(input)),
        };

        if !(subscriber.starts_with('7') || subscriber.starts_with('1')) {
            return Err(invalid_phone(input));
        }

        Ok(Self(format!("254{}", subscriber)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn invalid_phone(input: &str) -> AppError {
    AppError::BadRequest(format!("Invalid phone number: {}", input))
}

/// `validator` hook for optional phone fields on request DTOs.
pub fn validate_phone_number(value: &str) -> std::result::Result<(), validator::ValidationError> {
    PhoneNumber::parse(value)
        .map(|_| ())
        .map_err(|_| validator::ValidationError::new("phone_number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_normalization() {
        let expected = "254712345678";
        assert_eq!(PhoneNumber::parse("0712345678").unwrap().as_str(), expected);
        assert_eq!(PhoneNumber::parse("712345678").unwrap().as_str(), expected);
        assert_eq!(PhoneNumber::parse("254712345678").unwrap().as_str(), expected);
        assert_eq!(PhoneNumber::parse("+254 712-345-678").unwrap().as_str(), expected);
        assert_eq!(PhoneNumber::parse("0110123456").unwrap().as_str(), "254110123456");
    }

    #[test]
    fn test_phone_rejections() {
        for bad in ["", "abc", "071234567", "0812345678", "255712345678", "07123456789", "+"] {
            assert!(PhoneNumber::parse(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_status_from_result_code() {
        assert_eq!(PaymentStatus::from_result_code(0), PaymentStatus::Success);
        assert_eq!(PaymentStatus::from_result_code(1032), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_str("Cleared"), Some(PaymentStatus::Cleared));
        assert_eq!(PaymentStatus::from_str("pending"), None);
    }
}
