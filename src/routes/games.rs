//! `/games` catalog and `/assignments`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::db::games::{self, Assignment, CreateAssignment, CreateGame, Game, GameFilter};
use crate::error::ApiError;
use crate::server::AppState;

use super::extract::{ApiJson, ApiQuery};
use super::response::{Page, PageParams};

/// GET /api/v1/games?page=&pageSize=&type=&level=&skill=
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<GameFilter>,
) -> Result<Json<Page<Game>>, ApiError> {
    let request = params.resolve(&state);
    let slice = state
        .db
        .with_conn(|conn| games::list(conn, &auth.tenant_id, &filter, request))?;
    Ok(Json(Page::new(slice, request)))
}

/// POST /api/v1/games
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CreateGame>,
) -> Result<(StatusCode, Json<Game>), ApiError> {
    auth.require_editor()?;
    let game = state
        .db
        .with_conn(|conn| games::create(conn, &auth.tenant_id, &body))?;
    Ok((StatusCode::CREATED, Json(game)))
}

/// GET /api/v1/games/{id}
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Game>, ApiError> {
    let game = state
        .db
        .with_conn(|conn| games::require(conn, &auth.tenant_id, &id))?;
    Ok(Json(game))
}

/// DELETE /api/v1/games/{id}
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    auth.require_editor()?;
    if !state
        .db
        .with_conn(|conn| games::soft_delete(conn, &auth.tenant_id, &id))?
    {
        return Err(ApiError::not_found("Game", &id));
    }
    Ok(Json(json!({ "message": "Game deleted", "id": id })))
}

/// GET /api/v1/assignments
pub async fn list_assignments(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>, ApiError> {
    let assignments = state
        .db
        .with_conn(|conn| games::list_assignments(conn, &auth.tenant_id))?;
    Ok(Json(json!({ "assignments": assignments })))
}

/// POST /api/v1/assignments
///
/// Teachers assign games, so no editor role is required.
pub async fn create_assignment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CreateAssignment>,
) -> Result<(StatusCode, Json<Assignment>), ApiError> {
    let assignment = state
        .db
        .with_conn(|conn| games::create_assignment(conn, &auth.tenant_id, &body, &auth.user_id))?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// GET /api/v1/assignments/{id}
pub async fn get_assignment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Assignment>, ApiError> {
    let assignment = state
        .db
        .with_conn(|conn| games::require_assignment(conn, &auth.tenant_id, &id))?;
    Ok(Json(assignment))
}

/// DELETE /api/v1/assignments/{id}
pub async fn delete_assignment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state
        .db
        .with_conn(|conn| games::delete_assignment(conn, &auth.tenant_id, &id))?
    {
        return Err(ApiError::not_found("Assignment", &id));
    }
    Ok(Json(json!({ "message": "Assignment deleted", "id": id })))
}
