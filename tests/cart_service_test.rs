mod common;

use duka::{
    domain::{CreateProductRequest, Role, UpdateProductRequest, MAX_LINE_QUANTITY},
    error::AppError,
};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::test]
async fn test_repeated_adds_merge_into_one_line() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let alice = common::create_user(&t.ctx, "alice", Role::Customer).await?;
    let pump = common::create_product(&t.ctx, "Pump", 150).await?;
    let cart = &t.ctx.cart_service;

    for _ in 0..3 {
        cart.add_item(alice.id, pump.id, 1).await?;
    }

    let lines = cart.list(alice.id).await?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 3);
    assert_eq!(lines[0].name, "Pump");

    Ok(())
}

#[tokio::test]
async fn test_concurrent_adds_lose_no_increments() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let alice = common::create_user(&t.ctx, "alice", Role::Customer).await?;
    let pump = common::create_product(&t.ctx, "Pump", 150).await?;

    let adds = (0..10).map(|_| {
        let cart = t.ctx.cart_service.clone();
        async move { cart.add_item(alice.id, pump.id, 1).await }
    });
    for result in join_all(adds).await {
        result?;
    }

    let lines = t.ctx.cart_service.list(alice.id).await?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 10);

    Ok(())
}

#[tokio::test]
async fn test_total_follows_live_catalog_price() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let alice = common::create_user(&t.ctx, "alice", Role::Customer).await?;
    let pump = common::create_product(&t.ctx, "Pump", 150).await?;
    let cart = &t.ctx.cart_service;

    assert_eq!(cart.total(alice.id).await?, Decimal::ZERO);

    cart.add_item(alice.id, pump.id, 2).await?;
    assert_eq!(cart.total(alice.id).await?, Decimal::from(300));

    t.ctx.catalog_service.update(pump.id, UpdateProductRequest {
        price: Some(Decimal::new(17550, 2)),
        ..Default::default()
    }).await?;
    assert_eq!(cart.total(alice.id).await?, Decimal::new(35100, 2));

    Ok(())
}

#[tokio::test]
async fn test_carts_are_per_owner() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let alice = common::create_user(&t.ctx, "alice", Role::Customer).await?;
    let bob = common::create_user(&t.ctx, "bob", Role::Customer).await?;
    let pump = common::create_product(&t.ctx, "Pump", 150).await?;
    let cart = &t.ctx.cart_service;

    let line = cart.add_item(alice.id, pump.id, 1).await?;

    assert!(cart.list(bob.id).await?.is_empty());
    assert!(matches!(
        cart.set_quantity(bob.id, line.id, 5).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        cart.remove_item(bob.id, line.id).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(cart.list(alice.id).await?[0].quantity, 1);

    Ok(())
}

#[tokio::test]
async fn test_set_quantity_and_remove() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let alice = common::create_user(&t.ctx, "alice", Role::Customer).await?;
    let pump = common::create_product(&t.ctx, "Pump", 150).await?;
    let pipe = common::create_product(&t.ctx, "Pipe", 50).await?;
    let cart = &t.ctx.cart_service;

    let pump_line = cart.add_item(alice.id, pump.id, 1).await?;
    cart.add_item(alice.id, pipe.id, 1).await?;

    let updated = cart.set_quantity(alice.id, pump_line.id, 4).await?;
    assert_eq!(updated.quantity, 4);
    assert_eq!(cart.total(alice.id).await?, Decimal::from(650));

    assert!(matches!(
        cart.set_quantity(alice.id, pump_line.id, 0).await,
        Err(AppError::BadRequest(_))
    ));

    cart.remove_item(alice.id, pump_line.id).await?;
    assert!(matches!(
        cart.remove_item(alice.id, pump_line.id).await,
        Err(AppError::NotFound(_))
    ));

    let lines = cart.list(alice.id).await?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product_id, pipe.id);

    Ok(())
}

#[tokio::test]
async fn test_add_rejects_bad_input() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let alice = common::create_user(&t.ctx, "alice", Role::Customer).await?;
    let pump = common::create_product(&t.ctx, "Pump", 150).await?;
    let cart = &t.ctx.cart_service;

    assert!(matches!(
        cart.add_item(alice.id, Uuid::new_v4(), 1).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        cart.add_item(alice.id, pump.id, 0).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(cart.list(alice.id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_deleting_product_drops_cart_lines() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let alice = common::create_user(&t.ctx, "alice", Role::Customer).await?;
    let pump = common::create_product(&t.ctx, "Pump", 150).await?;

    t.ctx.cart_service.add_item(alice.id, pump.id, 2).await?;
    t.ctx.catalog_service.delete(pump.id).await?;

    assert!(t.ctx.cart_service.list(alice.id).await?.is_empty());
    assert_eq!(t.ctx.cart_service.total(alice.id).await?, Decimal::ZERO);

    Ok(())
}

#[tokio::test]
async fn test_line_quantity_is_capped() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let alice = common::create_user(&t.ctx, "alice", Role::Customer).await?;
    let pump = common::create_product(&t.ctx, "Pump", 150).await?;
    let cart = &t.ctx.cart_service;

    for quantity in [MAX_LINE_QUANTITY + 1, i64::MAX] {
        let result = cart.add_item(alice.id, pump.id, quantity).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))), "quantity {}", quantity);
    }
    assert!(cart.list(alice.id).await?.is_empty());

    let line = cart.add_item(alice.id, pump.id, 1).await?;
    let result = cart.set_quantity(alice.id, line.id, MAX_LINE_QUANTITY + 1).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    Ok(())
}

#[tokio::test]
async fn test_merge_past_cap_leaves_line_untouched() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let alice = common::create_user(&t.ctx, "alice", Role::Customer).await?;
    let pump = common::create_product(&t.ctx, "Pump", 150).await?;
    let cart = &t.ctx.cart_service;

    cart.add_item(alice.id, pump.id, MAX_LINE_QUANTITY).await?;

    let result = cart.add_item(alice.id, pump.id, 1).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    // The rejected merge is not persisted and the cart still reads back
    let lines = cart.list(alice.id).await?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, MAX_LINE_QUANTITY);
    assert_eq!(cart.total(alice.id).await?, Decimal::from(150 * MAX_LINE_QUANTITY));

    Ok(())
}

#[tokio::test]
async fn test_largest_price_at_largest_quantity_totals() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let alice = common::create_user(&t.ctx, "alice", Role::Customer).await?;
    let price: i64 = 90_000_000_000_000_000;
    let yacht = common::create_product(&t.ctx, "Yacht", price).await?;
    let cart = &t.ctx.cart_service;

    cart.add_item(alice.id, yacht.id, MAX_LINE_QUANTITY).await?;

    let expected = Decimal::from(price) * Decimal::from(MAX_LINE_QUANTITY);
    assert_eq!(cart.total(alice.id).await?, expected);
    assert_eq!(cart.list(alice.id).await?[0].line_total, expected);

    Ok(())
}

#[tokio::test]
async fn test_out_of_range_price_is_rejected() -> anyhow::Result<()> {
    let t = common::setup().await?;

    let result = t.ctx.catalog_service.create(CreateProductRequest {
        name: "Galaxy".to_string(),
        price: Decimal::from_scientific("1e27")?,
        description: None,
        category: None,
        image_url: None,
        quantity: None,
        total_stock: None,
    }).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert!(t.ctx.catalog_service.list().await?.is_empty());

    Ok(())
}
