use std::sync::Arc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    domain::{cart_total, CartLine, CartLineDetails, MAX_LINE_QUANTITY},
    error::{AppError, Result},
    repository::{CartRepository, ProductRepository},
};

pub struct CartService {
    cart_repo: Arc<dyn CartRepository>,
    product_repo: Arc<dyn ProductRepository>,
}

impl CartService {
    pub fn new(cart_repo: Arc<dyn CartRepository>, product_repo: Arc<dyn ProductRepository>) -> Self {
        Self { cart_repo, product_repo }
    }

    /// Adds `quantity` units, merging into the owner's existing line for the product.
    pub async fn add_item(&self, owner_id: Uuid, product_id: Uuid, quantity: i64) -> Result<CartLine> {
        validate_quantity(quantity)?;

        if self.product_repo.find_by_id(product_id).await?.is_none() {
            return Err(AppError::NotFound("Product not found".to_string()));
        }

        let line = self
            .cart_repo
            .upsert_line(owner_id, product_id, quantity)
            .await
            .map_err(|e| match e {
                // Product deleted between the lookup and the insert.
                AppError::Database(ref msg) if msg.contains("FOREIGN KEY") => {
                    AppError::NotFound("Product not found".to_string())
                }
                other => other,
            })?;

        tracing::debug!(
            "Cart {} now holds {} x {}",
            owner_id,
            line.quantity,
            product_id
        );
        Ok(line)
    }

    pub async fn set_quantity(&self, owner_id: Uuid, line_id: Uuid, quantity: i64) -> Result<CartLine> {
        validate_quantity(quantity)?;

        self.cart_repo
            .set_quantity(owner_id, line_id, quantity)
            .await?
            .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))
    }

    pub async fn remove_item(&self, owner_id: Uuid, line_id: Uuid) -> Result<()> {
        if !self.cart_repo.delete_line(owner_id, line_id).await? {
            return Err(AppError::NotFound("Cart item not found".to_string()));
        }
        Ok(())
    }

    /// Lines joined with current catalog prices.
    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<CartLineDetails>> {
        self.cart_repo.list_details(owner_id).await
    }

    pub async fn total(&self, owner_id: Uuid) -> Result<Decimal> {
        let lines = self.cart_repo.list_details(owner_id).await?;
        cart_total(&lines)
    }

    pub async fn clear(&self, owner_id: Uuid) -> Result<u64> {
        self.cart_repo.clear(owner_id).await
    }
}

fn validate_quantity(quantity: i64) -> Result<()> {
    if quantity < 1 {
        return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "Quantity cannot exceed {}",
            MAX_LINE_QUANTITY
        )));
    }
    Ok(())
}
