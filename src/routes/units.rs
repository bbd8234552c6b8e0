//! `/units` - unit CRUD, batch operations and derived reads

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::AuthUser;
use crate::curriculum::completeness::{self, CompletenessReport, ValidationReport};
use crate::curriculum::{learning_outcomes, templates, LearningOutcome};
use crate::db::units::{self, BulkUnitUpdate, Unit, UpdateUnit};
use crate::error::ApiError;
use crate::server::AppState;
use crate::suggestions::Suggestions;

use super::courses::ReorderBody;
use super::extract::{ApiJson, OptionalJson};

/// GET /api/v1/units/{id}
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Unit>, ApiError> {
    let unit = state
        .db
        .with_conn(|conn| units::require(conn, &auth.tenant_id, &id))?;
    Ok(Json(unit))
}

/// PATCH /api/v1/units/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateUnit>,
) -> Result<Json<Unit>, ApiError> {
    auth.require_editor()?;
    let unit = state
        .db
        .with_conn(|conn| units::update(conn, &auth.tenant_id, &id, &body))?;
    Ok(Json(unit))
}

/// DELETE /api/v1/units/{id}
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    auth.require_editor()?;
    state
        .db
        .with_conn_mut(|conn| units::delete(conn, &auth.tenant_id, &id))?;
    Ok(Json(json!({ "message": "Unit deleted", "id": id })))
}

/// POST /api/v1/units/reorder
pub async fn reorder(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<ReorderBody>,
) -> Result<Json<Value>, ApiError> {
    auth.require_editor()?;
    let units = state
        .db
        .with_conn_mut(|conn| units::reorder(conn, &auth.tenant_id, &body.orders))?;
    Ok(Json(json!({ "units": units })))
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateBody {
    pub updates: Vec<BulkUnitUpdate>,
}

/// POST /api/v1/units/bulk-update
pub async fn bulk_update(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<BulkUpdateBody>,
) -> Result<Json<Value>, ApiError> {
    auth.require_editor()?;
    let units = state
        .db
        .with_conn_mut(|conn| units::bulk_update(conn, &auth.tenant_id, &body.updates))?;
    info!(count = units.len(), user_id = %auth.user_id, "Bulk-updated units");
    Ok(Json(json!({ "updated": units.len(), "units": units })))
}

#[derive(Debug, Default, Deserialize)]
pub struct DuplicateBody {
    #[serde(default)]
    pub target_course_id: Option<String>,
}

/// POST /api/v1/units/{id}/duplicate
pub async fn duplicate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<DuplicateBody>,
) -> Result<(StatusCode, Json<Unit>), ApiError> {
    auth.require_editor()?;
    let unit = state.db.with_conn_mut(|conn| {
        units::duplicate(conn, &auth.tenant_id, &id, body.target_course_id.as_deref())
    })?;
    Ok((StatusCode::CREATED, Json(unit)))
}

#[derive(Debug, Deserialize)]
pub struct SplitBody {
    pub split_after_order_index: i64,
    #[serde(default)]
    pub new_title: Option<String>,
}

/// POST /api/v1/units/{id}/split
pub async fn split(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SplitBody>,
) -> Result<Json<Value>, ApiError> {
    auth.require_editor()?;
    let (source, new_unit) = state.db.with_conn_mut(|conn| {
        units::split(
            conn,
            &auth.tenant_id,
            &id,
            body.split_after_order_index,
            body.new_title.as_deref(),
        )
    })?;
    Ok(Json(json!({ "source": source, "new_unit": new_unit })))
}

#[derive(Debug, Serialize)]
pub struct CompletenessResponse {
    pub unit_id: String,
    #[serde(flatten)]
    pub report: CompletenessReport,
}

/// GET /api/v1/units/{id}/completeness
pub async fn completeness(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CompletenessResponse>, ApiError> {
    let (unit, report) = state
        .db
        .with_conn(|conn| units::refresh_completeness(conn, &auth.tenant_id, &id))?;
    Ok(Json(CompletenessResponse {
        unit_id: unit.id,
        report,
    }))
}

#[derive(Debug, Serialize)]
pub struct OutcomesResponse {
    pub unit_id: String,
    pub learning_outcomes: Vec<LearningOutcome>,
}

/// GET /api/v1/units/{id}/learning-outcomes
pub async fn learning_outcomes_for(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OutcomesResponse>, ApiError> {
    let unit = state
        .db
        .with_conn(|conn| units::require(conn, &auth.tenant_id, &id))?;
    Ok(Json(OutcomesResponse {
        learning_outcomes: learning_outcomes(&unit.objectives, &unit.skills, &unit.activities),
        unit_id: unit.id,
    }))
}

/// GET /api/v1/units/templates
pub async fn list_templates(_auth: AuthUser) -> Json<Value> {
    Json(json!({ "templates": templates::all() }))
}

/// POST /api/v1/units/{id}/ai-suggestions
pub async fn ai_suggestions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Suggestions>, ApiError> {
    let unit = state
        .db
        .with_conn(|conn| units::require(conn, &auth.tenant_id, &id))?;
    let suggestions = state.suggestions.suggest(&unit).await?;
    Ok(Json(suggestions))
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub unit_id: String,
    #[serde(flatten)]
    pub report: ValidationReport,
}

/// POST /api/v1/units/{id}/validate
pub async fn validate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let unit = state
        .db
        .with_conn(|conn| units::require(conn, &auth.tenant_id, &id))?;
    let report = completeness::validate(&unit.fields());
    Ok(Json(ValidateResponse {
        unit_id: unit.id,
        report,
    }))
}
