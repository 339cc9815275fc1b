pub mod user;
pub mod product;
pub mod cart;
pub mod payment;
pub mod money;

pub use user::*;
pub use product::*;
pub use cart::*;
pub use payment::*;
