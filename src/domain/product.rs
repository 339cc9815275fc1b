use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub category: String,
    pub image_url: String,
    /// Units available for sale.
    pub quantity: i64,
    pub total_stock: i64,
    pub sold_per_week: i64,
    pub sold_per_month: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Decimal,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub quantity: Option<i64>,
    pub total_stock: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub quantity: Option<i64>,
    pub total_stock: Option<i64>,
    pub sold_per_week: Option<i64>,
    pub sold_per_month: Option<i64>,
}
