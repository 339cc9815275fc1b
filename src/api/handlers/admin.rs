use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{MpesaPayment, PaymentWithUser, Role, User},
    error::Result,
    service::RequeryResult,
};

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub payment: MpesaPayment,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDto {
    id: Uuid,
    username: String,
    email: String,
    phone_number: Option<String>,
    role: Role,
    created_at: String,
}

impl From<User> for CustomerDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            phone_number: user.phone_number,
            role: user.role,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

pub async fn list_payments(State(state): State<AppState>) -> Result<Json<Vec<PaymentWithUser>>> {
    let payments = state.service_context.payment_service
        .list_with_users()
        .await?;

    Ok(Json(payments))
}

pub async fn clear_payment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClearResponse>> {
    let payment = state.service_context.payment_service
        .clear(id)
        .await?;

    tracing::info!("Admin {} cleared payment {}", current.user.username, payment.id);

    Ok(Json(ClearResponse {
        message: "Payment cleared and ready to ship.".to_string(),
        payment,
    }))
}

pub async fn requery_payment(
    State(state): State<AppState>,
    Path(checkout_request_id): Path<String>,
) -> Result<Json<RequeryResult>> {
    let result = state.service_context.payment_service
        .requery(&checkout_request_id)
        .await?;

    Ok(Json(result))
}

pub async fn list_customers(State(state): State<AppState>) -> Result<Json<Vec<CustomerDto>>> {
    let customers = state.service_context.payment_service
        .list_customers()
        .await?;

    Ok(Json(customers.into_iter().map(Into::into).collect()))
}
