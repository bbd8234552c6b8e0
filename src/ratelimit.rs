//! Sliding-window rate limiting per client and path
//!
//! Each key keeps the instants of its recent requests; a request is
//! admitted while fewer than `max_requests` fall inside the window.
//! Login has its own, stricter limiter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use tracing::warn;

use crate::error::ApiError;

pub const LOGIN_PATH: &str = "/api/v1/auth/login";

/// Sliding-window limiter keyed by an arbitrary string
pub struct RateLimiter {
    requests: DashMap<String, Vec<Instant>>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            requests: DashMap::new(),
            window,
            max_requests,
        }
    }

    /// Record a request if allowed; otherwise return seconds until a slot frees up
    pub fn check_and_record(&self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), u64> {
        let mut entry = self.requests.entry(key.to_string()).or_default();

        entry.retain(|&t| now.duration_since(t) < self.window);

        if entry.len() >= self.max_requests as usize {
            let oldest = entry.first().copied().unwrap_or(now);
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            // Round up so clients never retry a moment too early
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            return Err(secs.max(1));
        }

        entry.push(now);
        Ok(())
    }

    /// Drop keys with no requests left in the window
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.requests.retain(|_, times| {
            times.retain(|&t| now.duration_since(t) < self.window);
            !times.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.requests.len()
    }
}

/// The general limiter plus the login limiter
pub struct RateLimits {
    pub general: RateLimiter,
    pub login: RateLimiter,
}

impl RateLimits {
    pub fn new(window: Duration, max_requests: u32, login_max_requests: u32) -> Self {
        Self {
            general: RateLimiter::new(window, max_requests),
            login: RateLimiter::new(window, login_max_requests),
        }
    }

    pub fn cleanup(&self) {
        self.general.cleanup();
        self.login.cleanup();
    }
}

/// Client identity: first `X-Forwarded-For` hop, else the peer address
fn client_key(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Axum middleware applying the limiters
pub async fn rate_limit(State(limits): State<Arc<RateLimits>>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if path == "/health" {
        return next.run(req).await;
    }

    let client = client_key(&req);
    let limiter = if path == LOGIN_PATH {
        &limits.login
    } else {
        &limits.general
    };

    if let Err(retry_after_secs) = limiter.check_and_record(&format!("{}|{}", client, path)) {
        warn!(client = %client, path = %path, retry_after_secs, "Rate limit exceeded");
        return ApiError::RateLimited { retry_after_secs }.into_response();
    }

    next.run(req).await
}
