use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::crypto::CryptoError;
use crate::database::models::{Role, User};
use crate::database::DatabaseError;
use crate::tenancy::TenancyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Campus the user belongs to; becomes the tenant marker for authenticated requests
    pub tenant_id: String,
    pub role: Role,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user: &User, token_type: TokenType, expiry_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id.to_string(),
            tenant_id: user.tenant_id.clone(),
            role: user.role,
            token_type,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(expiry_secs)).timestamp(),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid mobile number or PIN")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error(transparent)]
    Tenancy(#[from] TenancyError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Signs and verifies HS256 tokens with the configured secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_token_expiry_secs: i64,
    refresh_token_expiry_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_token_expiry_secs: i64, refresh_token_expiry_secs: i64) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::InvalidSecret);
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expiry_secs,
            refresh_token_expiry_secs,
        })
    }

    pub fn from_config(config: &SecurityConfig) -> Result<Self, AuthError> {
        Self::new(
            &config.jwt_secret,
            config.access_token_expiry_secs,
            config.refresh_token_expiry_secs,
        )
    }

    pub fn access_token_expiry_secs(&self) -> i64 {
        self.access_token_expiry_secs
    }

    pub fn issue_access_token(&self, user: &User) -> Result<String, AuthError> {
        self.sign(&Claims::new(user, TokenType::Access, self.access_token_expiry_secs))
    }

    pub fn issue_refresh_token(&self, user: &User) -> Result<String, AuthError> {
        self.sign(&Claims::new(user, TokenType::Refresh, self.refresh_token_expiry_secs))
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))
    }

    /// Verify signature and expiry, and require an access token
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        if token_data.claims.token_type != TokenType::Access {
            return Err(AuthError::InvalidToken("not an access token".to_string()));
        }
        Ok(token_data.claims)
    }
}
