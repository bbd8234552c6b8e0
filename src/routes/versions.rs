//! `/versions` - version reads, edits, workflow actions and comparison

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::curriculum::diff::{self, VersionDiff};
use crate::curriculum::{ReviewDecision, VersionAction};
use crate::db::courses::{self, Course, CreateCourse};
use crate::db::versions::{self, TransitionRequest, UpdateVersion, Version};
use crate::error::ApiError;
use crate::server::AppState;

use super::extract::{ApiJson, ApiQuery, OptionalJson};

/// GET /api/v1/versions/{id}
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Version>, ApiError> {
    let version = state
        .db
        .with_conn(|conn| versions::require(conn, &auth.tenant_id, &id))?;
    Ok(Json(version))
}

/// PATCH /api/v1/versions/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateVersion>,
) -> Result<Json<Version>, ApiError> {
    auth.require_editor()?;
    let version = state
        .db
        .with_conn(|conn| versions::update(conn, &auth.tenant_id, &id, &body))?;
    Ok(Json(version))
}

fn run_transition(
    state: &AppState,
    auth: &AuthUser,
    id: &str,
    request: TransitionRequest<'_>,
) -> Result<Json<Version>, ApiError> {
    let version = state
        .db
        .with_conn_mut(|conn| versions::apply_transition(conn, &auth.tenant_id, id, &request))?;
    Ok(Json(version))
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentBody {
    #[serde(default)]
    pub comments: Option<String>,
}

/// DELETE /api/v1/versions/{id} - archives the version
pub async fn archive(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<CommentBody>,
) -> Result<Json<Version>, ApiError> {
    auth.require_editor()?;
    let request = TransitionRequest {
        action: VersionAction::Archive,
        comments: body.comments.as_deref(),
        rollout_notes: None,
        actor_user_id: &auth.user_id,
    };
    run_transition(&state, &auth, &id, request)
}

/// POST /api/v1/versions/{id}/submit
pub async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<CommentBody>,
) -> Result<Json<Version>, ApiError> {
    auth.require_editor()?;
    let request = TransitionRequest {
        action: VersionAction::Submit,
        comments: body.comments.as_deref(),
        rollout_notes: None,
        actor_user_id: &auth.user_id,
    };
    run_transition(&state, &auth, &id, request)
}

#[derive(Debug, Deserialize)]
pub struct ApproveBody {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub comments: Option<String>,
}

/// POST /api/v1/versions/{id}/approve
pub async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ApproveBody>,
) -> Result<Json<Version>, ApiError> {
    auth.require_reviewer()?;
    let request = TransitionRequest {
        action: VersionAction::Review(body.decision),
        comments: body.comments.as_deref(),
        rollout_notes: None,
        actor_user_id: &auth.user_id,
    };
    run_transition(&state, &auth, &id, request)
}

#[derive(Debug, Default, Deserialize)]
pub struct PublishBody {
    #[serde(default)]
    pub rollout_notes: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

/// POST /api/v1/versions/{id}/publish
pub async fn publish(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<PublishBody>,
) -> Result<Json<Version>, ApiError> {
    auth.require_publisher()?;
    let request = TransitionRequest {
        action: VersionAction::Publish,
        comments: body.comments.as_deref(),
        rollout_notes: body.rollout_notes.as_deref(),
        actor_user_id: &auth.user_id,
    };
    run_transition(&state, &auth, &id, request)
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub base: String,
    pub compare: String,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub base: Version,
    pub compare: Version,
    #[serde(flatten)]
    pub diff: VersionDiff,
}

/// GET /api/v1/versions/compare?base=&compare=
pub async fn compare(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<CompareQuery>,
) -> Result<Json<CompareResponse>, ApiError> {
    let (base, compare, diff) = state.db.with_conn(|conn| {
        let base = versions::require(conn, &auth.tenant_id, &query.base)?;
        let compare = versions::require(conn, &auth.tenant_id, &query.compare)?;
        let base_tree = versions::load_tree(conn, &auth.tenant_id, &base.id)?;
        let compare_tree = versions::load_tree(conn, &auth.tenant_id, &compare.id)?;
        Ok((base, compare, diff::compare(&base_tree, &compare_tree)))
    })?;
    Ok(Json(CompareResponse { base, compare, diff }))
}

/// GET /api/v1/versions/{id}/courses
pub async fn list_courses(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let courses = state
        .db
        .with_conn(|conn| courses::list(conn, &auth.tenant_id, &id))?;
    Ok(Json(json!({ "courses": courses })))
}

/// POST /api/v1/versions/{id}/courses
pub async fn create_course(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CreateCourse>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    auth.require_editor()?;
    let course = state
        .db
        .with_conn(|conn| courses::create(conn, &auth.tenant_id, &id, &body))?;
    Ok((StatusCode::CREATED, Json(course)))
}
