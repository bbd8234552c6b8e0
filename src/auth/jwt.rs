//! JWT access and refresh tokens
//!
//! - HS256 with a shared secret of at least 32 bytes
//! - Every token carries a random `jti` so it can be revoked individually
//! - `token_type` keeps refresh tokens from being used as access tokens

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::roles::Role;
use crate::config::MIN_JWT_SECRET_LEN;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Payload stored in every token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub tenant_id: String,
    pub email: String,
    pub role: Role,
    pub token_type: TokenType,
    pub jti: String,
    pub iat: u64,
    pub exp: u64,
}

/// Identity a token is issued for
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub user_id: String,
    pub tenant_id: String,
    pub email: String,
    pub role: Role,
}

/// Login / refresh response body (minus the user)
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

/// JWT generator and validator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    access_expiry_seconds: u64,
    refresh_expiry_seconds: u64,
}

fn unix_now() -> Result<u64, ApiError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| ApiError::Internal(format!("System time error: {}", e)))
}

impl JwtValidator {
    pub fn new(secret: String, access_expiry_seconds: u64, refresh_expiry_seconds: u64) -> Result<Self, ApiError> {
        if secret.is_empty() {
            return Err(ApiError::Config("JWT_SECRET is required".into()));
        }
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ApiError::Config(format!(
                "JWT_SECRET must be at least {} characters",
                MIN_JWT_SECRET_LEN
            )));
        }

        Ok(Self {
            secret,
            access_expiry_seconds,
            refresh_expiry_seconds,
        })
    }

    pub fn access_expiry_seconds(&self) -> u64 {
        self.access_expiry_seconds
    }

    /// Sign one token of the given type
    pub fn generate_token(&self, input: &TokenInput, token_type: TokenType) -> Result<(String, Claims), ApiError> {
        let now = unix_now()?;
        let ttl = match token_type {
            TokenType::Access => self.access_expiry_seconds,
            TokenType::Refresh => self.refresh_expiry_seconds,
        };

        let claims = Claims {
            sub: input.user_id.clone(),
            tenant_id: input.tenant_id.clone(),
            email: input.email.clone(),
            role: input.role,
            token_type,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))?;

        Ok((token, claims))
    }

    /// Issue a fresh access/refresh pair
    pub fn issue_pair(&self, input: &TokenInput) -> Result<TokenPair, ApiError> {
        let (access_token, _) = self.generate_token(input, TokenType::Access)?;
        let (refresh_token, _) = self.generate_token(input, TokenType::Refresh)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.access_expiry_seconds,
        })
    }

    /// Verify signature, expiry and token type
    pub fn verify_token(&self, token: &str, expected: TokenType) -> Result<Claims, ApiError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|err| {
            let message = match err.kind() {
                ErrorKind::ExpiredSignature => "Token expired",
                ErrorKind::InvalidToken => "Invalid token",
                ErrorKind::InvalidSignature => "Invalid signature",
                _ => "Token validation failed",
            };
            ApiError::Unauthorized(message.into())
        })?
        .claims;

        if claims.token_type != expected {
            return Err(ApiError::Unauthorized("Wrong token type".into()));
        }
        Ok(claims)
    }
}

/// Extract token from an Authorization header value.
/// Accepts "Bearer <token>" and bare tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}
