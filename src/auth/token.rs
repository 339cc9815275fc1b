use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    domain::{Role, User},
    error::{AppError, Result},
};

/// Payload of the bearer credential handed out at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Signs and verifies HS256 credentials with a fixed validity window.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, issuer: impl Into<String>, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.issuer.clone(), config.token_ttl_minutes)
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            iss: self.issuer.clone(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))?;
        tracing::debug!(user_id = %claims.sub, role = claims.role.as_str(), "token issued");
        Ok(token)
    }

    /// Rejects bad signatures, expired or malformed tokens and foreign issuers.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.leeway = 5;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("token rejected: {}", e);
                AppError::Unauthorized
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            phone_number: None,
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = TokenService::new("test-secret", "duka", 60);
        let alice = user(Role::Admin);
        let token = tokens.issue(&alice).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, alice.id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_rejects_expired_token() {
        let tokens = TokenService::new("test-secret", "duka", 60);
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: Role::Customer,
            iat: now - 7200,
            exp: now - 3600,
            iss: "duka".to_string(),
        };
        let token = tokens.sign(&claims).unwrap();
        assert!(matches!(tokens.verify(&token), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_rejects_wrong_secret_and_issuer() {
        let issuer = TokenService::new("secret-one", "duka", 60);
        let token = issuer.issue(&user(Role::Customer)).unwrap();

        let other_secret = TokenService::new("secret-two", "duka", 60);
        assert!(other_secret.verify(&token).is_err());

        let other_issuer = TokenService::new("secret-one", "someone-else", 60);
        assert!(other_issuer.verify(&token).is_err());
    }

    #[test]
    fn test_rejects_malformed_and_tampered_tokens() {
        let tokens = TokenService::new("test-secret", "duka", 60);
        assert!(tokens.verify("not-a-jwt").is_err());
        assert!(tokens.verify("").is_err());

        let token = tokens.issue(&user(Role::Customer)).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(tokens.verify(&tampered).is_err());
    }
}
