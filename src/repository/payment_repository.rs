use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{
        money, MpesaPayment, NewMpesaPayment, PaymentResolution, PaymentStatus,
        PaymentUser, PaymentWithUser,
    },
    error::{AppError, Result},
    repository::PaymentRepository,
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    user_id: Option<String>,
    merchant_request_id: String,
    checkout_request_id: String,
    response_code: String,
    response_description: String,
    customer_message: String,
    phone_number: String,
    amount_cents: i64,
    result_code: Option<i64>,
    mpesa_receipt_number: Option<String>,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct PaymentWithUserRow {
    #[sqlx(flatten)]
    payment: PaymentRow,
    username: Option<String>,
    email: Option<String>,
}

const PAYMENT_COLUMNS: &str = r#"
    mpesa_payments.id, mpesa_payments.user_id, mpesa_payments.merchant_request_id,
    mpesa_payments.checkout_request_id, mpesa_payments.response_code,
    mpesa_payments.response_description, mpesa_payments.customer_message,
    mpesa_payments.phone_number, mpesa_payments.amount_cents,
    mpesa_payments.result_code, mpesa_payments.mpesa_receipt_number,
    mpesa_payments.status, mpesa_payments.created_at, mpesa_payments.updated_at
"#;

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<MpesaPayment> {
        Ok(MpesaPayment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: row
                .user_id
                .map(|id| Uuid::parse_str(&id).map_err(|e| AppError::Database(e.to_string())))
                .transpose()?,
            merchant_request_id: row.merchant_request_id,
            checkout_request_id: row.checkout_request_id,
            response_code: row.response_code,
            response_description: row.response_description,
            customer_message: row.customer_message,
            phone_number: row.phone_number,
            amount: money::from_cents(row.amount_cents),
            result_code: row.result_code,
            mpesa_receipt_number: row.mpesa_receipt_number,
            status: PaymentStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid payment status: {}", row.status)))?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<MpesaPayment>> {
        let query = format!(
            "SELECT {} FROM mpesa_payments WHERE mpesa_payments.{} = ?",
            PAYMENT_COLUMNS, column
        );

        let row = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_payment).transpose()
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: NewMpesaPayment) -> Result<MpesaPayment> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let amount_cents = money::to_cents(payment.amount)?;

        sqlx::query(
            r#"
            INSERT INTO mpesa_payments (
                id, user_id, merchant_request_id, checkout_request_id,
                response_code, response_description, customer_message,
                phone_number, amount_cents, result_code, status,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(payment.user_id.map(|id| id.to_string()))
        .bind(&payment.merchant_request_id)
        .bind(&payment.checkout_request_id)
        .bind(&payment.response_code)
        .bind(&payment.response_description)
        .bind(&payment.customer_message)
        .bind(&payment.phone_number)
        .bind(amount_cents)
        .bind(payment.result_code)
        .bind(payment.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MpesaPayment>> {
        self.find_one("id", &id.to_string()).await
    }

    async fn find_by_checkout_id(&self, checkout_request_id: &str) -> Result<Option<MpesaPayment>> {
        self.find_one("checkout_request_id", checkout_request_id).await
    }

    async fn list_with_users(&self) -> Result<Vec<PaymentWithUser>> {
        let query = format!(
            r#"
            SELECT {}, users.username AS username, users.email AS email
            FROM mpesa_payments
            LEFT JOIN users ON users.id = mpesa_payments.user_id
            ORDER BY mpesa_payments.created_at DESC, mpesa_payments.id
            "#,
            PAYMENT_COLUMNS
        );

        let rows = sqlx::query_as::<_, PaymentWithUserRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let user = match (row.username, row.email) {
                    (Some(username), Some(email)) => Some(PaymentUser { username, email }),
                    _ => None,
                };
                Ok(PaymentWithUser {
                    payment: Self::row_to_payment(row.payment)?,
                    user,
                })
            })
            .collect()
    }

    async fn resolve_pending(&self, resolution: &PaymentResolution) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE mpesa_payments
            SET status = ?,
                customer_message = ?,
                result_code = ?,
                mpesa_receipt_number = COALESCE(?, mpesa_receipt_number),
                updated_at = ?
            WHERE checkout_request_id = ? AND status = ?
            "#
        )
        .bind(resolution.status().as_str())
        .bind(&resolution.message)
        .bind(resolution.result_code)
        .bind(&resolution.mpesa_receipt_number)
        .bind(Utc::now().naive_utc())
        .bind(&resolution.checkout_request_id)
        .bind(PaymentStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn transition(&self, id: Uuid, from: &[PaymentStatus], to: PaymentStatus) -> Result<bool> {
        if from.is_empty() {
            return Ok(false);
        }

        let placeholders = vec!["?"; from.len()].join(", ");
        let query = format!(
            "UPDATE mpesa_payments SET status = ?, updated_at = ? WHERE id = ? AND status IN ({})",
            placeholders
        );

        let mut update = sqlx::query(&query)
            .bind(to.as_str())
            .bind(Utc::now().naive_utc())
            .bind(id.to_string());
        for status in from {
            update = update.bind(status.as_str());
        }

        let result = update
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}
