use std::sync::Arc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    domain::{CreateProductRequest, Product, UpdateProductRequest},
    error::{AppError, Result},
    repository::ProductRepository,
};

pub struct CatalogService {
    repo: Arc<dyn ProductRepository>,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn ProductRepository>) -> Self {
        Self { repo }
    }

    /// Newest first
    pub async fn list(&self) -> Result<Vec<Product>> {
        self.repo.list().await
    }

    pub async fn get(&self, id: Uuid) -> Result<Product> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
    }

    pub async fn create(&self, mut request: CreateProductRequest) -> Result<Product> {
        request.name = request.name.trim().to_string();
        if request.name.is_empty() {
            return Err(AppError::BadRequest("Product name is required".to_string()));
        }
        validate_price(request.price)?;
        validate_count("quantity", request.quantity)?;
        validate_count("totalStock", request.total_stock)?;

        let product = self.repo.create(request).await?;
        tracing::info!("Created product {} ({})", product.name, product.id);
        Ok(product)
    }

    pub async fn update(&self, id: Uuid, request: UpdateProductRequest) -> Result<Product> {
        if let Some(ref name) = request.name {
            if name.trim().is_empty() {
                return Err(AppError::BadRequest("Product name cannot be empty".to_string()));
            }
        }
        if let Some(price) = request.price {
            validate_price(price)?;
        }
        validate_count("quantity", request.quantity)?;
        validate_count("totalStock", request.total_stock)?;
        validate_count("soldPerWeek", request.sold_per_week)?;
        validate_count("soldPerMonth", request.sold_per_month)?;

        self.repo.update(id, request).await
    }

    /// Cart lines referencing the product go with it.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.repo.delete(id).await?;
        tracing::info!("Deleted product {}", id);
        Ok(())
    }
}

fn validate_price(price: Decimal) -> Result<()> {
    if price < Decimal::ZERO {
        return Err(AppError::BadRequest("Price cannot be negative".to_string()));
    }
    Ok(())
}

fn validate_count(field: &str, value: Option<i64>) -> Result<()> {
    match value {
        Some(v) if v < 0 => Err(AppError::BadRequest(format!("{} cannot be negative", field))),
        _ => Ok(()),
    }
}
