//! Resources, approval records, comments and standard mappings

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::curriculum::EntityRef;
use crate::db::attachments::{self, Comment, CreateComment, CreateResource, Resource};
use crate::db::mappings::{self, CreateMapping, Mapping};
use crate::error::ApiError;
use crate::server::AppState;

use super::extract::{ApiJson, ApiQuery};
use super::frameworks::MappingQuery;

/// GET /api/v1/resources/units/{id}/resources
pub async fn list_unit_resources(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let entity = EntityRef::Unit(id);
    let resources = state
        .db
        .with_conn(|conn| attachments::list_resources(conn, &auth.tenant_id, &entity))?;
    Ok(Json(json!({ "resources": resources })))
}

/// POST /api/v1/resources/units/{id}/resources
pub async fn create_unit_resource(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CreateResource>,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    auth.require_editor()?;
    let entity = EntityRef::Unit(id);
    let resource = state.db.with_conn(|conn| {
        attachments::create_resource(conn, &auth.tenant_id, &entity, &body, &auth.user_id)
    })?;
    Ok((StatusCode::CREATED, Json(resource)))
}

/// GET /api/v1/approvals/versions/{id}/approvals
pub async fn list_version_approvals(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let approvals = state
        .db
        .with_conn(|conn| attachments::list_approvals(conn, &auth.tenant_id, &id))?;
    Ok(Json(json!({ "approvals": approvals })))
}

fn entity_from_path(entity_type: &str, id: &str) -> Result<EntityRef, ApiError> {
    EntityRef::parse(entity_type, id).map_err(ApiError::Validation)
}

/// GET /api/v1/comments/entities/{type}/{id}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((entity_type, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let entity = entity_from_path(&entity_type, &id)?;
    let comments = state
        .db
        .with_conn(|conn| attachments::list_comments(conn, &auth.tenant_id, &entity))?;
    Ok(Json(json!({ "comments": comments })))
}

/// POST /api/v1/comments/entities/{type}/{id}/comments
///
/// Any authenticated member of the tenant may comment.
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((entity_type, id)): Path<(String, String)>,
    ApiJson(body): ApiJson<CreateComment>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let entity = entity_from_path(&entity_type, &id)?;
    let comment = state.db.with_conn(|conn| {
        attachments::create_comment(conn, &auth.tenant_id, &entity, &body, &auth.user_id)
    })?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/v1/mappings
pub async fn list_mappings(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<MappingQuery>,
) -> Result<Json<Value>, ApiError> {
    let mappings = state
        .db
        .with_conn(|conn| mappings::list(conn, &auth.tenant_id, query.framework_id.as_deref()))?;
    Ok(Json(json!({ "mappings": mappings })))
}

/// POST /api/v1/mappings
pub async fn create_mapping(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CreateMapping>,
) -> Result<(StatusCode, Json<Mapping>), ApiError> {
    auth.require_editor()?;
    let mapping = state
        .db
        .with_conn(|conn| mappings::create(conn, &auth.tenant_id, &body))?;
    Ok((StatusCode::CREATED, Json(mapping)))
}
