use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::{SaltString, rand_core::OsRng};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    domain::{validate_phone_number, CreateUserRequest, PhoneNumber, Role, User},
    error::{AppError, Result},
    repository::UserRepository,
};

pub mod token;

pub use token::{Claims, TokenService};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 5))]
    pub password: String,
    #[validate(custom(function = "validate_phone_number"))]
    pub phone_number: Option<String>,
}

/// A freshly issued credential and the account it belongs to.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub token: String,
    pub user: User,
}

pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(user_repo: Arc<dyn UserRepository>, tokens: TokenService) -> Self {
        Self { user_repo, tokens }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        let argon2 = Argon2::default();

        Ok(argon2.verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }

    pub async fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    /// Creates a customer account. Signup can never create an admin.
    pub async fn register(&self, request: RegisterRequest) -> Result<User> {
        request.validate()?;

        let email = request.email.trim().to_lowercase();
        let phone_number = request
            .phone_number
            .as_deref()
            .map(PhoneNumber::parse)
            .transpose()?
            .map(|phone| phone.to_string());

        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("User already exists.".to_string()));
        }
        if self.user_repo.find_by_username(&request.username).await?.is_some() {
            return Err(AppError::Conflict("User already exists.".to_string()));
        }

        let user = self
            .user_repo
            .create(CreateUserRequest {
                username: request.username,
                email,
                password: request.password,
                phone_number,
                role: Role::Customer,
            })
            .await
            .map_err(|e| {
                // Lost a race with a concurrent signup for the same email/username.
                if e.is_unique_violation() {
                    AppError::Conflict("User already exists.".to_string())
                } else {
                    e
                }
            })?;

        tracing::info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Unknown email and wrong password produce the same error.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<AuthenticatedUser> {
        let email = email.trim().to_lowercase();

        let password_hash = self
            .user_repo
            .find_password_hash(&email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !Self::verify_password(password, &password_hash).await? {
            tracing::debug!("Rejected login for {}", email);
            return Err(AppError::Unauthorized);
        }

        let user = self
            .user_repo
            .find_by_email(&email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let token = self.tokens.issue(&user)?;
        Ok(AuthenticatedUser { token, user })
    }

    /// Resolves a bearer credential to its claims.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.tokens.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_password_hashing() {
        let hash = AuthService::hash_password("pw123456").await.unwrap();
        assert_ne!(hash, "pw123456");
        assert!(AuthService::verify_password("pw123456", &hash).await.unwrap());
        assert!(!AuthService::verify_password("wrong", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let first = AuthService::hash_password("same").await.unwrap();
        let second = AuthService::hash_password("same").await.unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_register_request_validation() {
        let short = RegisterRequest {
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password: "pw12".to_string(),
            phone_number: Some("0712345678".to_string()),
        };
        // four-character password is below the minimum
        assert!(short.validate().is_err());

        let valid = RegisterRequest { password: "pw123".to_string(), ..short };
        assert!(valid.validate().is_ok());

        let bad_phone = RegisterRequest { phone_number: Some("12".to_string()), ..valid.clone() };
        assert!(bad_phone.validate().is_err());

        let bad_email = RegisterRequest { email: "not-an-email".to_string(), ..valid };
        assert!(bad_email.validate().is_err());
    }
}
