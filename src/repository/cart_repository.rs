use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{money, CartLine, CartLineDetails, MAX_LINE_QUANTITY},
    error::{AppError, Result},
    repository::CartRepository,
};

#[derive(FromRow)]
struct CartLineRow {
    id: String,
    owner_id: String,
    product_id: String,
    quantity: i64,
    added_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct CartDetailsRow {
    id: String,
    product_id: String,
    name: String,
    price_cents: i64,
    quantity: i64,
    image_url: String,
}

pub struct SqliteCartRepository {
    pool: SqlitePool,
}

impl SqliteCartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_uuid(value: &str) -> Result<Uuid> {
        Uuid::parse_str(value).map_err(|e| AppError::Database(e.to_string()))
    }

    fn row_to_line(row: CartLineRow) -> Result<CartLine> {
        Ok(CartLine {
            id: Self::parse_uuid(&row.id)?,
            owner_id: Self::parse_uuid(&row.owner_id)?,
            product_id: Self::parse_uuid(&row.product_id)?,
            quantity: row.quantity,
            added_at: DateTime::from_naive_utc_and_offset(row.added_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_details(row: CartDetailsRow) -> Result<CartLineDetails> {
        CartLineDetails::new(
            Self::parse_uuid(&row.id)?,
            Self::parse_uuid(&row.product_id)?,
            row.name,
            money::from_cents(row.price_cents),
            row.quantity,
            row.image_url,
        )
    }

    async fn find_by_owner_and_product(&self, owner_id: Uuid, product_id: Uuid) -> Result<Option<CartLine>> {
        let row = sqlx::query_as::<_, CartLineRow>(
            r#"
            SELECT id, owner_id, product_id, quantity, added_at, updated_at
            FROM cart_items
            WHERE owner_id = ? AND product_id = ?
            "#
        )
        .bind(owner_id.to_string())
        .bind(product_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_line).transpose()
    }
}

#[async_trait]
impl CartRepository for SqliteCartRepository {
    async fn upsert_line(&self, owner_id: Uuid, product_id: Uuid, quantity: i64) -> Result<CartLine> {
        let now = Utc::now().naive_utc();

        // The merge is skipped, not committed, when it would pass the cap.
        let result = sqlx::query(
            r#"
            INSERT INTO cart_items (id, owner_id, product_id, quantity, added_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner_id, product_id) DO UPDATE SET
                quantity = cart_items.quantity + excluded.quantity,
                updated_at = excluded.updated_at
            WHERE cart_items.quantity + excluded.quantity <= ?
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(owner_id.to_string())
        .bind(product_id.to_string())
        .bind(quantity)
        .bind(now)
        .bind(now)
        .bind(MAX_LINE_QUANTITY)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::BadRequest(format!(
                "A cart line cannot hold more than {} units",
                MAX_LINE_QUANTITY
            )));
        }

        self.find_by_owner_and_product(owner_id, product_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve cart line".to_string())
        })
    }

    async fn find_line(&self, owner_id: Uuid, line_id: Uuid) -> Result<Option<CartLine>> {
        let row = sqlx::query_as::<_, CartLineRow>(
            r#"
            SELECT id, owner_id, product_id, quantity, added_at, updated_at
            FROM cart_items
            WHERE id = ? AND owner_id = ?
            "#
        )
        .bind(line_id.to_string())
        .bind(owner_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_line).transpose()
    }

    async fn set_quantity(&self, owner_id: Uuid, line_id: Uuid, quantity: i64) -> Result<Option<CartLine>> {
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = ?, updated_at = ? WHERE id = ? AND owner_id = ?"
        )
        .bind(quantity)
        .bind(Utc::now().naive_utc())
        .bind(line_id.to_string())
        .bind(owner_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_line(owner_id, line_id).await
    }

    async fn delete_line(&self, owner_id: Uuid, line_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ? AND owner_id = ?")
            .bind(line_id.to_string())
            .bind(owner_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_details(&self, owner_id: Uuid) -> Result<Vec<CartLineDetails>> {
        let rows = sqlx::query_as::<_, CartDetailsRow>(
            r#"
            SELECT c.id, c.product_id, p.name, p.price_cents, c.quantity, p.image_url
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE c.owner_id = ?
            ORDER BY c.added_at, c.id
            "#
        )
        .bind(owner_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(Self::row_to_details)
            .collect()
    }

    async fn clear(&self, owner_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE owner_id = ?")
            .bind(owner_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
