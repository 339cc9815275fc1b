mod common;

use duka::{
    auth::RegisterRequest,
    domain::Role,
    error::AppError,
};
use futures_util::future::join_all;

fn register_request(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: "pw123".to_string(),
        phone_number: Some("0712345678".to_string()),
    }
}

#[tokio::test]
async fn test_register_then_authenticate() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let auth = &t.ctx.auth_service;

    let user = auth.register(register_request("alice", "Alice@X.com")).await?;
    assert_eq!(user.role, Role::Customer);
    assert_eq!(user.email, "alice@x.com");
    assert_eq!(user.phone_number.as_deref(), Some("254712345678"));

    let authenticated = auth.authenticate("alice@x.com", "pw123").await?;
    assert_eq!(authenticated.user.id, user.id);

    let claims = auth.verify(&authenticated.token)?;
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.role, Role::Customer);

    Ok(())
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_look_the_same() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let auth = &t.ctx.auth_service;
    auth.register(register_request("alice", "a@x.com")).await?;

    let wrong_password = auth.authenticate("a@x.com", "nope1").await;
    assert!(matches!(wrong_password, Err(AppError::Unauthorized)));

    let unknown = auth.authenticate("nobody@x.com", "pw123").await;
    assert!(matches!(unknown, Err(AppError::Unauthorized)));

    Ok(())
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let auth = &t.ctx.auth_service;
    auth.register(register_request("alice", "a@x.com")).await?;

    let same_email = auth.register(register_request("alice2", "A@x.com")).await;
    assert!(matches!(same_email, Err(AppError::Conflict(_))));

    let same_username = auth.register(register_request("alice", "other@x.com")).await;
    assert!(matches!(same_username, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_registration_yields_one_account() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let auth = t.ctx.auth_service.clone();

    let attempts = (0..4).map(|i| {
        let auth = auth.clone();
        async move { auth.register(register_request(&format!("bob{}", i), "bob@x.com")).await }
    });
    let results = join_all(attempts).await;

    let created = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict(_))))
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 3);

    Ok(())
}

#[tokio::test]
async fn test_invalid_registration_is_rejected() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let auth = &t.ctx.auth_service;

    let mut short_password = register_request("alice", "a@x.com");
    short_password.password = "pw".to_string();
    assert!(matches!(auth.register(short_password).await, Err(AppError::BadRequest(_))));

    let mut bad_phone = register_request("alice", "a@x.com");
    bad_phone.phone_number = Some("0812345678".to_string());
    assert!(matches!(auth.register(bad_phone).await, Err(AppError::BadRequest(_))));

    assert!(t.ctx.user_repo.find_by_email("a@x.com").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_token_from_another_secret_is_rejected() -> anyhow::Result<()> {
    let t = common::setup().await?;
    let user = common::create_user(&t.ctx, "mallory", Role::Admin).await?;

    let forged = duka::auth::TokenService::new("other-secret", "duka", 60).issue(&user)?;
    assert!(matches!(t.ctx.auth_service.verify(&forged), Err(AppError::Unauthorized)));

    Ok(())
}
