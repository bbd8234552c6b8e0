//! Login, token refresh, profile and logout

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::auth::jwt::{TokenInput, TokenPair, TokenType};
use crate::auth::password::verify_password;
use crate::auth::AuthUser;
use crate::db::users::{self, User};
use crate::error::ApiError;
use crate::server::AppState;

use super::extract::{ApiJson, OptionalJson};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Token pair plus the signed-in user
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials".into())
}

fn token_input(user: &User) -> TokenInput {
    TokenInput {
        user_id: user.id.clone(),
        tenant_id: user.tenant_id.clone(),
        email: user.email.clone(),
        role: user.role,
    }
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::Validation("email and password are required".into()));
    }

    let user = state
        .db
        .with_conn(|conn| users::find_active_by_email(conn, &body.email))?;
    let Some(user) = user else {
        warn!(email = %body.email, "Login failed: unknown user");
        return Err(invalid_credentials());
    };

    // Argon2 verification blocks; run it off the async workers
    let hash = user.password_hash.clone();
    let password = body.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Password check failed: {}", e)))??;
    if !valid {
        warn!(user_id = %user.id, "Login failed: wrong password");
        return Err(invalid_credentials());
    }

    let tokens = state.jwt.issue_pair(&token_input(&user))?;
    info!(user_id = %user.id, tenant_id = %user.tenant_id, role = %user.role, "User logged in");

    Ok(Json(SessionResponse { tokens, user }))
}

/// POST /api/v1/auth/refresh
///
/// Rotates the refresh token: the presented one is revoked.
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let claims = state.jwt.verify_token(&body.refresh_token, TokenType::Refresh)?;

    let user = state.db.with_conn(|conn| {
        if users::is_token_revoked(conn, &claims.jti)? {
            return Err(ApiError::Unauthorized("Token has been revoked".into()));
        }
        let user = users::get_active(conn, &claims.tenant_id, &claims.sub)?
            .ok_or_else(|| ApiError::Unauthorized("User no longer exists".into()))?;
        users::revoke_token(conn, &claims.jti, claims.exp as i64)?;
        Ok(user)
    })?;

    let tokens = state.jwt.issue_pair(&token_input(&user))?;
    debug!(user_id = %user.id, "Refreshed token pair");

    Ok(Json(SessionResponse { tokens, user }))
}

/// GET /api/v1/auth/me
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>, ApiError> {
    let user = state
        .db
        .with_conn(|conn| users::get_active(conn, &auth.tenant_id, &auth.user_id))?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".into()))?;
    Ok(Json(json!({ "user": user })))
}

/// POST /api/v1/auth/logout
///
/// Revokes the access token used for the call and, when supplied, the
/// caller's refresh token.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    OptionalJson(body): OptionalJson<LogoutRequest>,
) -> Result<Json<Value>, ApiError> {
    let refresh = match body.refresh_token.as_deref() {
        Some(token) => match state.jwt.verify_token(token, TokenType::Refresh) {
            Ok(claims) if claims.sub == auth.user_id => Some(claims),
            Ok(_) => {
                debug!(user_id = %auth.user_id, "Ignoring refresh token of another user");
                None
            }
            Err(e) => {
                debug!(user_id = %auth.user_id, error = %e, "Ignoring invalid refresh token on logout");
                None
            }
        },
        None => None,
    };

    state.db.with_conn(|conn| {
        users::revoke_token(conn, &auth.jti, auth.exp as i64)?;
        if let Some(claims) = &refresh {
            users::revoke_token(conn, &claims.jti, claims.exp as i64)?;
        }
        Ok(())
    })?;

    info!(user_id = %auth.user_id, "User logged out");
    Ok(Json(json!({ "message": "Logged out" })))
}
