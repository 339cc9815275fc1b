use axum::{extract::State, http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

use crate::api::state::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Duka API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Storefront with cart and M-Pesa checkout",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "auth": "/login",
            "products": "/products",
            "cart": "/cart",
            "mpesa": "/mpesa/stk",
            "admin": "/admin"
        }
    }))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = sqlx::query("SELECT 1")
        .execute(&state.service_context.db_pool)
        .await;

    let (status, label) = match database {
        Ok(_) => (StatusCode::OK, "healthy"),
        Err(e) => {
            tracing::error!("Health check database ping failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };

    (status, Json(json!({
        "status": label,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
