use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{money, CreateProductRequest, Product, UpdateProductRequest},
    error::{AppError, Result},
    repository::ProductRepository,
};

#[derive(FromRow)]
struct ProductRow {
    id: String,
    name: String,
    description: String,
    price_cents: i64,
    category: String,
    image_url: String,
    quantity: i64,
    total_stock: i64,
    sold_per_week: i64,
    sold_per_month: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const PRODUCT_COLUMNS: &str = r#"
    id, name, description, price_cents, category, image_url, quantity,
    total_stock, sold_per_week, sold_per_month, created_at, updated_at
"#;

pub struct SqliteProductRepository {
    pool: SqlitePool,
}

impl SqliteProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_product(row: ProductRow) -> Result<Product> {
        Ok(Product {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            name: row.name,
            description: row.description,
            price: money::from_cents(row.price_cents),
            category: row.category,
            image_url: row.image_url,
            quantity: row.quantity,
            total_stock: row.total_stock,
            sold_per_week: row.sold_per_week,
            sold_per_month: row.sold_per_month,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn create(&self, request: CreateProductRequest) -> Result<Product> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let price_cents = money::to_cents(request.price)?;
        let quantity = request.quantity.unwrap_or(0);

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, price_cents, category, image_url,
                quantity, total_stock, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&request.name)
        .bind(request.description.as_deref().unwrap_or_default())
        .bind(price_cents)
        .bind(request.category.as_deref().unwrap_or_default())
        .bind(request.image_url.as_deref().unwrap_or_default())
        .bind(quantity)
        .bind(request.total_stock.unwrap_or(quantity))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created product".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        let query = format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list(&self) -> Result<Vec<Product>> {
        let query = format!(
            "SELECT {} FROM products ORDER BY created_at DESC, id",
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProductRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(Self::row_to_product)
            .collect()
    }

    async fn update(&self, id: Uuid, update: UpdateProductRequest) -> Result<Product> {
        let price_cents = update.price.map(money::to_cents).transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = COALESCE(?, name),
                description = COALESCE(?, description),
                price_cents = COALESCE(?, price_cents),
                category = COALESCE(?, category),
                image_url = COALESCE(?, image_url),
                quantity = COALESCE(?, quantity),
                total_stock = COALESCE(?, total_stock),
                sold_per_week = COALESCE(?, sold_per_week),
                sold_per_month = COALESCE(?, sold_per_month),
                updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(&update.name)
        .bind(&update.description)
        .bind(price_cents)
        .bind(&update.category)
        .bind(&update.image_url)
        .bind(update.quantity)
        .bind(update.total_stock)
        .bind(update.sold_per_week)
        .bind(update.sold_per_month)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product not found".to_string()));
        }

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated product".to_string())
        })
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product not found".to_string()));
        }

        Ok(())
    }
}
