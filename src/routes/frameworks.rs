//! `/kct` - curriculum frameworks and their versions

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::AuthUser;
use crate::db::attachments;
use crate::db::frameworks::{self, CreateFramework, Framework, FrameworkFilter, UpdateFramework};
use crate::db::mappings;
use crate::db::versions::{self, CreateVersion, Version, VersionStats};
use crate::error::ApiError;
use crate::server::AppState;

use super::extract::{ApiJson, ApiQuery};
use super::response::{Page, PageParams};

/// GET /api/v1/kct
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<FrameworkFilter>,
) -> Result<Json<Page<Framework>>, ApiError> {
    let request = params.resolve(&state);
    let slice = state
        .db
        .with_conn(|conn| frameworks::list(conn, &auth.tenant_id, &filter, request))?;
    Ok(Json(Page::new(slice, request)))
}

/// POST /api/v1/kct
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CreateFramework>,
) -> Result<(StatusCode, Json<Framework>), ApiError> {
    auth.require_editor()?;
    let framework = state
        .db
        .with_conn(|conn| frameworks::create(conn, &auth.tenant_id, &body, &auth.user_id))?;
    info!(framework_id = %framework.id, code = %framework.code, "Framework created");
    Ok((StatusCode::CREATED, Json(framework)))
}

/// GET /api/v1/kct/{id}
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Framework>, ApiError> {
    let framework = state
        .db
        .with_conn(|conn| frameworks::require(conn, &auth.tenant_id, &id))?;
    Ok(Json(framework))
}

/// PATCH /api/v1/kct/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateFramework>,
) -> Result<Json<Framework>, ApiError> {
    auth.require_editor()?;
    let framework = state
        .db
        .with_conn(|conn| frameworks::update(conn, &auth.tenant_id, &id, &body))?;
    Ok(Json(framework))
}

/// DELETE /api/v1/kct/{id}
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    auth.require_editor()?;
    let deleted = state
        .db
        .with_conn(|conn| frameworks::soft_delete(conn, &auth.tenant_id, &id))?;
    if !deleted {
        return Err(ApiError::not_found("Framework", &id));
    }
    info!(framework_id = %id, user_id = %auth.user_id, "Framework deleted");
    Ok(Json(json!({ "message": "Framework deleted", "id": id })))
}

/// GET /api/v1/kct/{id}/versions
pub async fn list_versions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let versions = state
        .db
        .with_conn(|conn| versions::list(conn, &auth.tenant_id, &id))?;
    Ok(Json(json!({ "versions": versions })))
}

/// POST /api/v1/kct/{id}/versions
pub async fn create_version(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CreateVersion>,
) -> Result<(StatusCode, Json<Version>), ApiError> {
    auth.require_editor()?;
    let version = state
        .db
        .with_conn_mut(|conn| versions::create(conn, &auth.tenant_id, &id, &body, &auth.user_id))?;
    info!(
        framework_id = %id,
        version_id = %version.id,
        version_no = %version.version_no,
        "Version created"
    );
    Ok((StatusCode::CREATED, Json(version)))
}

/// GET /api/v1/kct/{id}/versions/history
pub async fn version_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let history = state.db.with_conn(|conn| {
        frameworks::require(conn, &auth.tenant_id, &id)?;
        attachments::framework_history(conn, &auth.tenant_id, &id)
    })?;
    Ok(Json(json!({ "framework_id": id, "history": history })))
}

/// GET /api/v1/kct/{id}/versions/stats
pub async fn version_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<VersionStats>, ApiError> {
    let stats = state
        .db
        .with_conn(|conn| versions::stats(conn, &auth.tenant_id, &id))?;
    Ok(Json(stats))
}

#[derive(Debug, Default, Deserialize)]
pub struct MappingQuery {
    pub framework_id: Option<String>,
}

/// GET /api/v1/kct/mappings
pub async fn mappings(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<MappingQuery>,
) -> Result<Json<Value>, ApiError> {
    let mappings = state
        .db
        .with_conn(|conn| mappings::list(conn, &auth.tenant_id, query.framework_id.as_deref()))?;
    Ok(Json(json!({ "mappings": mappings })))
}
