use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod user_repository;
pub mod product_repository;
pub mod cart_repository;
pub mod payment_repository;

pub use user_repository::SqliteUserRepository;
pub use product_repository::SqliteProductRepository;
pub use cart_repository::SqliteCartRepository;
pub use payment_repository::SqlitePaymentRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn find_password_hash(&self, email: &str) -> Result<Option<String>>;
    async fn list_by_role(&self, role: Role) -> Result<Vec<User>>;
    async fn update_role(&self, id: Uuid, role: Role) -> Result<User>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: CreateProductRequest) -> Result<Product>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>>;
    async fn list(&self) -> Result<Vec<Product>>;
    async fn update(&self, id: Uuid, update: UpdateProductRequest) -> Result<Product>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Inserts the line or adds `quantity` to the existing one in a single statement.
    async fn upsert_line(&self, owner_id: Uuid, product_id: Uuid, quantity: i64) -> Result<CartLine>;
    async fn find_line(&self, owner_id: Uuid, line_id: Uuid) -> Result<Option<CartLine>>;
    async fn set_quantity(&self, owner_id: Uuid, line_id: Uuid, quantity: i64) -> Result<Option<CartLine>>;
    async fn delete_line(&self, owner_id: Uuid, line_id: Uuid) -> Result<bool>;
    async fn list_details(&self, owner_id: Uuid) -> Result<Vec<CartLineDetails>>;
    async fn clear(&self, owner_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: NewMpesaPayment) -> Result<MpesaPayment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MpesaPayment>>;
    async fn find_by_checkout_id(&self, checkout_request_id: &str) -> Result<Option<MpesaPayment>>;
    async fn list_with_users(&self) -> Result<Vec<PaymentWithUser>>;
    /// Compare-and-set on `Pending`. Returns false when the record is missing
    /// or already resolved.
    async fn resolve_pending(&self, resolution: &PaymentResolution) -> Result<bool>;
    /// Moves the record to `to` only if its current status is one of `from`.
    async fn transition(&self, id: Uuid, from: &[PaymentStatus], to: PaymentStatus) -> Result<bool>;
}
