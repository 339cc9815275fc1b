use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::PaymentStatusView,
    error::Result,
    payments::{CallbackAck, StkCallbackEnvelope, StkPushAccepted},
};

#[derive(Debug, Deserialize)]
pub struct StkRequest {
    pub phone: String,
    /// Falls back to the cart total when omitted.
    pub amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub token: Option<String>,
}

pub async fn stk_push(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<StkRequest>,
) -> Result<Json<StkPushAccepted>> {
    let accepted = state.service_context.payment_service
        .initiate(Some(current.user.id), &req.phone, req.amount)
        .await?;

    Ok(Json(accepted))
}

/// Daraja retries anything but a 200 with `ResultCode: 0`, so every body,
/// valid or not, gets the same acknowledgement.
pub async fn callback(
    State(state): State<AppState>,
    params: Option<Query<CallbackParams>>,
    body: Bytes,
) -> Json<CallbackAck> {
    if let Some(expected) = state.settings.mpesa.callback_token.as_deref() {
        let given = params
            .and_then(|Query(p)| p.token)
            .unwrap_or_default();
        let matches: bool = expected.as_bytes().ct_eq(given.as_bytes()).into();
        if !matches {
            tracing::warn!("Ignoring M-Pesa callback with missing or wrong token");
            return Json(CallbackAck::accepted());
        }
    }

    let callback = match StkCallbackEnvelope::from_slice(&body) {
        Ok(envelope) => envelope.into_callback(),
        Err(e) => {
            tracing::warn!("Malformed M-Pesa callback: {}", e);
            return Json(CallbackAck::accepted());
        }
    };

    tracing::debug!(
        "M-Pesa callback for {}: {} {}",
        callback.checkout_request_id,
        callback.result_code,
        callback.result_desc
    );

    if let Err(e) = state.service_context.payment_service.reconcile(callback).await {
        tracing::error!("Failed to apply M-Pesa callback: {}", e);
    }

    Json(CallbackAck::accepted())
}

pub async fn status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<PaymentStatusView>> {
    let view = state.service_context.payment_service
        .status(&request_id)
        .await?;

    Ok(Json(view))
}
