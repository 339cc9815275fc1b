pub mod admin;
pub mod auth;
pub mod cart;
pub mod mpesa;
pub mod products;
pub mod root;
