//! `/courses` - course CRUD, ordering and the units inside a course

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::db::courses::{self, Course, UpdateCourse};
use crate::db::ordering::OrderEntry;
use crate::db::units::{self, CreateUnit, Unit};
use crate::error::ApiError;
use crate::server::AppState;

use super::extract::ApiJson;

/// `{orders: [{id, order_index}]}`, shared with unit reordering
#[derive(Debug, Deserialize)]
pub struct ReorderBody {
    pub orders: Vec<OrderEntry>,
}

/// GET /api/v1/courses/{id}
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Course>, ApiError> {
    let course = state
        .db
        .with_conn(|conn| courses::require(conn, &auth.tenant_id, &id))?;
    Ok(Json(course))
}

/// PATCH /api/v1/courses/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateCourse>,
) -> Result<Json<Course>, ApiError> {
    auth.require_editor()?;
    let course = state
        .db
        .with_conn(|conn| courses::update(conn, &auth.tenant_id, &id, &body))?;
    Ok(Json(course))
}

/// DELETE /api/v1/courses/{id}
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    auth.require_editor()?;
    state
        .db
        .with_conn_mut(|conn| courses::delete(conn, &auth.tenant_id, &id))?;
    Ok(Json(json!({ "message": "Course deleted", "id": id })))
}

/// POST /api/v1/courses/reorder
pub async fn reorder(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<ReorderBody>,
) -> Result<Json<Value>, ApiError> {
    auth.require_editor()?;
    let courses = state
        .db
        .with_conn_mut(|conn| courses::reorder(conn, &auth.tenant_id, &body.orders))?;
    Ok(Json(json!({ "courses": courses })))
}

/// GET /api/v1/courses/{id}/units
pub async fn list_units(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let units = state
        .db
        .with_conn(|conn| units::list(conn, &auth.tenant_id, &id))?;
    Ok(Json(json!({ "units": units })))
}

/// POST /api/v1/courses/{id}/units
pub async fn create_unit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CreateUnit>,
) -> Result<(StatusCode, Json<Unit>), ApiError> {
    auth.require_editor()?;
    let unit = state
        .db
        .with_conn(|conn| units::create(conn, &auth.tenant_id, &id, &body))?;
    Ok((StatusCode::CREATED, Json(unit)))
}
