use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{
    api::state::AppState,
    domain::User,
    error::{AppError, Result},
};

#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
}

/// Resolves the bearer credential to the stored user record.
async fn authenticate(state: &AppState, bearer: Option<TypedHeader<Authorization<Bearer>>>) -> Result<User> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AppError::Unauthorized)?;

    let claims = state.service_context.auth_service.verify(bearer.token())?;

    // Account deleted since the token was issued
    state.service_context.user_repo
        .find_by_id(claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = authenticate(&state, bearer).await?;

    request.extensions_mut().insert(CurrentUser { user });

    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = authenticate(&state, bearer).await?;

    // The stored role wins over the one in the token, so demotion takes effect at once.
    if !user.is_admin() {
        tracing::debug!("Non-admin {} denied {}", user.id, request.uri().path());
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(CurrentUser { user });

    Ok(next.run(request).await)
}
