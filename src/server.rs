//! HTTP server: shared state, router assembly and the serve loop

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::jwt::JwtValidator;
use crate::config::Args;
use crate::db::Database;
use crate::error::ApiError;
use crate::ratelimit::{rate_limit, RateLimits};
use crate::routes;
use crate::suggestions::{RuleBasedSuggester, SuggestionProvider};

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub jwt: JwtValidator,
    pub limits: Arc<RateLimits>,
    /// Backend for `POST /units/{id}/ai-suggestions`
    pub suggestions: Arc<dyn SuggestionProvider>,
    pub settings: Arc<Args>,
}

impl AppState {
    /// Build state from validated settings with the default suggestion provider
    pub fn new(settings: Args, db: Database) -> Result<Self, ApiError> {
        Self::with_provider(settings, db, Arc::new(RuleBasedSuggester))
    }

    pub fn with_provider(
        settings: Args,
        db: Database,
        suggestions: Arc<dyn SuggestionProvider>,
    ) -> Result<Self, ApiError> {
        let secret = settings
            .effective_jwt_secret()
            .ok_or_else(|| ApiError::Config("JWT_SECRET is required in production mode".into()))?;
        let jwt = JwtValidator::new(secret, settings.jwt_expiry_seconds, settings.refresh_expiry_seconds)?;
        let limits = RateLimits::new(
            Duration::from_secs(settings.rate_limit_window_secs),
            settings.rate_limit_max_requests,
            settings.login_rate_limit_max_requests,
        );

        Ok(Self {
            db: Arc::new(db),
            jwt,
            limits: Arc::new(limits),
            suggestions,
            settings: Arc::new(settings),
        })
    }
}

/// Assemble the full router: `/health`, `/api/v1/*`, the JSON 404 fallback
/// and the tracing, CORS and rate-limit layers
pub fn build_router(state: AppState) -> Router {
    let limits = state.limits.clone();

    Router::new()
        .route("/health", axum::routing::get(routes::health::health))
        .nest("/api/v1", routes::api_router())
        .fallback(routes::not_found)
        .layer(from_fn_with_state(limits, rate_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the process is stopped
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let listen = state.settings.listen;
    let app = build_router(state);

    let listener = TcpListener::bind(listen).await?;
    info!("kct-server listening on http://{}", listen);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
