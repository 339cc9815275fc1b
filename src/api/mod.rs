pub mod handlers;
pub mod middleware;
pub mod state;
pub mod uploads;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    settings: Arc<Settings>,
) -> Router {
    let cors = cors_layer(&settings);
    let images = ServeDir::new(&settings.server.uploads_dir);
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        // Auth routes
        .route("/signup", post(handlers::auth::signup))
        .route("/login", post(handlers::auth::login))

        // Catalog reads are public
        .route("/products", get(handlers::products::list))
        .route("/products/:id", get(handlers::products::get))

        // Provider-facing M-Pesa endpoints
        .route("/mpesa/callback", post(handlers::mpesa::callback))
        .route("/mpesa/status/:request_id", get(handlers::mpesa::status))

        .merge(customer_routes(app_state.clone()))
        .merge(catalog_admin_routes(app_state.clone()))
        .nest("/admin", admin_routes(app_state.clone()))

        // Product images
        .nest_service("/uploads", images)

        // Add state to the router
        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn customer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(handlers::auth::me))
        .route("/cart", get(handlers::cart::list).post(handlers::cart::add))
        .route("/cart/total", get(handlers::cart::total))
        .route("/cart/:id", put(handlers::cart::update).delete(handlers::cart::remove))
        .route("/mpesa/stk", post(handlers::mpesa::stk_push))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn catalog_admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/products", post(handlers::products::create))
        .route("/products/upload", post(handlers::products::create_with_image))
        .route("/products/:id", put(handlers::products::update).delete(handlers::products::delete))
        .route("/products/:id/image", put(handlers::products::set_image))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
        // Room for one image plus the form's text fields
        .layer(DefaultBodyLimit::max(uploads::MAX_IMAGE_BYTES + 64 * 1024))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/payments", get(handlers::admin::list_payments))
        .route("/payments/:id/clear", put(handlers::admin::clear_payment))
        .route("/payments/requery/:checkout_request_id", post(handlers::admin::requery_payment))
        .route("/customers", get(handlers::admin::list_customers))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let Some(origin) = settings.server.cors_origin.as_deref() else {
        return CorsLayer::permissive();
    };

    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        Err(_) => {
            tracing::warn!("Invalid CORS origin {:?}; allowing any origin", origin);
            CorsLayer::permissive()
        }
    }
}
