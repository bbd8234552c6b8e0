//! REST API under `/api/v1`
//!
//! Handlers are thin: extract, check the caller's role, run one storage
//! call under the connection lock, wrap the result.

pub mod attachments;
pub mod auth;
pub mod courses;
pub mod extract;
pub mod frameworks;
pub mod games;
pub mod health;
pub mod response;
pub mod units;
pub mod versions;

use axum::http::Uri;
use axum::routing::{get, post};
use axum::Router;

use crate::error::ApiError;
use crate::server::AppState;

/// Routes mounted at `/api/v1`
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        // Frameworks
        .route("/kct", get(frameworks::list).post(frameworks::create))
        .route("/kct/mappings", get(frameworks::mappings))
        .route(
            "/kct/:id",
            get(frameworks::get)
                .patch(frameworks::update)
                .delete(frameworks::delete),
        )
        .route(
            "/kct/:id/versions",
            get(frameworks::list_versions).post(frameworks::create_version),
        )
        .route("/kct/:id/versions/history", get(frameworks::version_history))
        .route("/kct/:id/versions/stats", get(frameworks::version_stats))
        // Versions
        .route("/versions/compare", get(versions::compare))
        .route(
            "/versions/:id",
            get(versions::get)
                .patch(versions::update)
                .delete(versions::archive),
        )
        .route("/versions/:id/submit", post(versions::submit))
        .route("/versions/:id/approve", post(versions::approve))
        .route("/versions/:id/publish", post(versions::publish))
        .route(
            "/versions/:id/courses",
            get(versions::list_courses).post(versions::create_course),
        )
        // Courses
        .route("/courses/reorder", post(courses::reorder))
        .route(
            "/courses/:id",
            get(courses::get).patch(courses::update).delete(courses::delete),
        )
        .route(
            "/courses/:id/units",
            get(courses::list_units).post(courses::create_unit),
        )
        // Units
        .route("/units/templates", get(units::list_templates))
        .route("/units/reorder", post(units::reorder))
        .route("/units/bulk-update", post(units::bulk_update))
        .route(
            "/units/:id",
            get(units::get).patch(units::update).delete(units::delete),
        )
        .route("/units/:id/duplicate", post(units::duplicate))
        .route("/units/:id/split", post(units::split))
        .route("/units/:id/completeness", get(units::completeness))
        .route("/units/:id/learning-outcomes", get(units::learning_outcomes_for))
        .route("/units/:id/ai-suggestions", post(units::ai_suggestions))
        .route("/units/:id/validate", post(units::validate))
        // Attachments
        .route(
            "/resources/units/:id/resources",
            get(attachments::list_unit_resources).post(attachments::create_unit_resource),
        )
        .route(
            "/approvals/versions/:id/approvals",
            get(attachments::list_version_approvals),
        )
        .route(
            "/comments/entities/:entity_type/:id/comments",
            get(attachments::list_comments).post(attachments::create_comment),
        )
        .route(
            "/mappings",
            get(attachments::list_mappings).post(attachments::create_mapping),
        )
        // Games
        .route("/games", get(games::list).post(games::create))
        .route("/games/:id", get(games::get).delete(games::delete))
        .route(
            "/assignments",
            get(games::list_assignments).post(games::create_assignment),
        )
        .route(
            "/assignments/:id",
            get(games::get_assignment).delete(games::delete_assignment),
        )
}

/// Fallback for unknown routes, in the error envelope
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route not found: {}", uri.path()))
}
