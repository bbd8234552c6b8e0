//! Authentication and authorization
//!
//! - `jwt` - access/refresh token issue and verification
//! - `password` - Argon2id hashing
//! - `roles` - role enum and role-derived permissions
//!
//! Handlers take an [`AuthUser`] argument; the extractor rejects the request
//! with 401 before the handler runs when the bearer token is missing,
//! invalid, of the wrong type or revoked.

pub mod jwt;
pub mod password;
pub mod roles;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

use crate::db::users;
use crate::error::ApiError;
use crate::server::AppState;
use jwt::{extract_token_from_header, TokenType};
use roles::Role;

/// The authenticated caller, taken from a verified access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub tenant_id: String,
    pub email: String,
    pub role: Role,
    pub jti: String,
    pub exp: u64,
}

impl AuthUser {
    pub fn require_editor(&self) -> Result<(), ApiError> {
        if self.role.can_edit_curriculum() {
            Ok(())
        } else {
            Err(forbidden(self.role, "edit curriculum"))
        }
    }

    pub fn require_reviewer(&self) -> Result<(), ApiError> {
        if self.role.can_review() {
            Ok(())
        } else {
            Err(forbidden(self.role, "review versions"))
        }
    }

    pub fn require_publisher(&self) -> Result<(), ApiError> {
        if self.role.can_publish() {
            Ok(())
        } else {
            Err(forbidden(self.role, "publish versions"))
        }
    }
}

fn forbidden(role: Role, what: &str) -> ApiError {
    ApiError::Forbidden(format!("Role '{}' may not {}", role, what))
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = extract_token_from_header(header)
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;

        let claims = state.jwt.verify_token(token, TokenType::Access)?;

        let revoked = state
            .db
            .with_conn(|conn| users::is_token_revoked(conn, &claims.jti))?;
        if revoked {
            debug!(jti = %claims.jti, "Rejected revoked token");
            return Err(ApiError::Unauthorized("Token has been revoked".into()));
        }

        Ok(AuthUser {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            email: claims.email,
            role: claims.role,
            jti: claims.jti,
            exp: claims.exp,
        })
    }
}
