pub mod catalog_service;
pub mod cart_service;
pub mod payment_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::{AuthService, TokenService};
use crate::config::Settings;
use crate::payments::MobileMoneyGateway;
use catalog_service::CatalogService;
use cart_service::CartService;
use payment_service::PaymentService;

pub use payment_service::{ReconcileOutcome, RequeryOutcome, RequeryResult};

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub product_repo: Arc<dyn ProductRepository>,
    pub cart_repo: Arc<dyn CartRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub auth_service: Arc<AuthService>,
    pub catalog_service: Arc<CatalogService>,
    pub cart_service: Arc<CartService>,
    pub payment_service: Arc<PaymentService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    /// Wires the SQLite repositories and services. `gateway` is `None` when
    /// M-Pesa is disabled; checkout then answers 503.
    pub fn new(
        db_pool: SqlitePool,
        settings: &Settings,
        gateway: Option<Arc<dyn MobileMoneyGateway>>,
    ) -> Self {
        let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let product_repo: Arc<dyn ProductRepository> = Arc::new(SqliteProductRepository::new(db_pool.clone()));
        let cart_repo: Arc<dyn CartRepository> = Arc::new(SqliteCartRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(
            user_repo.clone(),
            TokenService::from_config(&settings.auth),
        ));
        let catalog_service = Arc::new(CatalogService::new(product_repo.clone()));
        let cart_service = Arc::new(CartService::new(cart_repo.clone(), product_repo.clone()));
        let payment_service = Arc::new(PaymentService::new(
            payment_repo.clone(),
            cart_repo.clone(),
            user_repo.clone(),
            gateway,
            settings.payments.restrict_clear_to_success,
        ));

        Self {
            user_repo,
            product_repo,
            cart_repo,
            payment_repo,
            auth_service,
            catalog_service,
            cart_service,
            payment_service,
            db_pool,
        }
    }
}
