#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use duka::{
    config::Settings,
    domain::{CreateProductRequest, CreateUserRequest, Product, Role, User},
    error::{AppError, Result},
    payments::{
        MobileMoneyGateway, StkCallback, StkCallbackEnvelope, StkPushAccepted, StkPushRequest,
        StkQueryResult,
    },
    service::ServiceContext,
};
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Stands in for Daraja: accepts every push unless told to reject, and
/// answers status queries from a fixed table.
#[derive(Default)]
pub struct StubGateway {
    pub reject_with: Option<String>,
    pub calls: AtomicUsize,
    pub pushes: Mutex<Vec<StkPushRequest>>,
    pub query_results: Mutex<HashMap<String, StkQueryResult>>,
}

impl StubGateway {
    pub fn rejecting(message: &str) -> Self {
        Self {
            reject_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_push(&self) -> Option<StkPushRequest> {
        self.pushes.lock().unwrap().last().cloned()
    }

    pub fn set_query_result(&self, checkout_request_id: &str, result: StkQueryResult) {
        self.query_results
            .lock()
            .unwrap()
            .insert(checkout_request_id.to_string(), result);
    }
}

#[async_trait]
impl MobileMoneyGateway for StubGateway {
    fn name(&self) -> &str {
        "stub"
    }

    async fn stk_push(&self, request: &StkPushRequest) -> Result<StkPushAccepted> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.pushes.lock().unwrap().push(request.clone());

        if let Some(ref message) = self.reject_with {
            return Err(AppError::Provider(message.clone()));
        }

        Ok(StkPushAccepted {
            merchant_request_id: format!("29115-34620561-{}", n),
            checkout_request_id: format!("ws_CO_19122019102036392{}", n),
            response_code: "0".to_string(),
            response_description: "Success. Request accepted for processing".to_string(),
            customer_message: "Success. Request accepted for processing".to_string(),
        })
    }

    async fn query_status(&self, checkout_request_id: &str) -> Result<StkQueryResult> {
        self.query_results
            .lock()
            .unwrap()
            .get(checkout_request_id)
            .cloned()
            .ok_or_else(|| {
                AppError::Provider("400.002.02: Bad Request - Invalid CheckoutRequestID".to_string())
            })
    }
}

pub struct TestContext {
    pub pool: SqlitePool,
    pub settings: Arc<Settings>,
    pub gateway: Arc<StubGateway>,
    pub ctx: Arc<ServiceContext>,
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.auth.jwt_secret = "test-secret".to_string();
    settings
}

/// A single connection keeps the in-memory database alive and shared.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await?;

    Ok(pool)
}

pub async fn setup() -> anyhow::Result<TestContext> {
    setup_with(test_settings(), StubGateway::default()).await
}

pub async fn setup_with(settings: Settings, gateway: StubGateway) -> anyhow::Result<TestContext> {
    let pool = test_pool().await?;
    let gateway = Arc::new(gateway);
    let dyn_gateway: Arc<dyn MobileMoneyGateway> = gateway.clone();
    let ctx = Arc::new(ServiceContext::new(pool.clone(), &settings, Some(dyn_gateway)));

    Ok(TestContext {
        pool,
        settings: Arc::new(settings),
        gateway,
        ctx,
    })
}

pub async fn create_user(ctx: &ServiceContext, username: &str, role: Role) -> anyhow::Result<User> {
    let user = ctx.user_repo.create(CreateUserRequest {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: "pw123".to_string(),
        phone_number: Some("254712345678".to_string()),
        role,
    }).await?;
    Ok(user)
}

pub async fn create_product(ctx: &ServiceContext, name: &str, price: i64) -> anyhow::Result<Product> {
    let product = ctx.product_repo.create(CreateProductRequest {
        name: name.to_string(),
        price: Decimal::from(price),
        description: None,
        category: None,
        image_url: None,
        quantity: Some(10),
        total_stock: None,
    }).await?;
    Ok(product)
}

pub fn callback_json(checkout_request_id: &str, result_code: i64) -> String {
    if result_code == 0 {
        format!(
            r#"{{"Body":{{"stkCallback":{{
                "MerchantRequestID":"29115-34620561-1",
                "CheckoutRequestID":"{}",
                "ResultCode":0,
                "ResultDesc":"The service request is processed successfully.",
                "CallbackMetadata":{{"Item":[
                    {{"Name":"Amount","Value":300.00}},
                    {{"Name":"MpesaReceiptNumber","Value":"NLJ7RT61SV"}},
                    {{"Name":"TransactionDate","Value":20191219102115}},
                    {{"Name":"PhoneNumber","Value":254712345678}}
                ]}}
            }}}}}}"#,
            checkout_request_id
        )
    } else {
        format!(
            r#"{{"Body":{{"stkCallback":{{
                "MerchantRequestID":"29115-34620561-1",
                "CheckoutRequestID":"{}",
                "ResultCode":{},
                "ResultDesc":"Request cancelled by user"
            }}}}}}"#,
            checkout_request_id, result_code
        )
    }
}

pub fn callback(checkout_request_id: &str, result_code: i64) -> StkCallback {
    StkCallbackEnvelope::from_slice(callback_json(checkout_request_id, result_code).as_bytes())
        .expect("valid callback fixture")
        .into_callback()
}
