//! Configuration for kct-server
//!
//! CLI arguments and environment variables via clap, with an optional TOML
//! overlay file for deployments that prefer a config file.

use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Minimum accepted length of the JWT signing secret
pub const MIN_JWT_SECRET_LEN: usize = 32;

const DEV_JWT_SECRET: &str = "dev-only-insecure-secret-do-not-deploy-000";

/// kct-server - curriculum framework service
#[derive(Parser, Debug, Clone)]
#[command(name = "kct-server")]
#[command(about = "Multi-tenant curriculum framework REST service")]
pub struct Args {
    /// Optional TOML file whose values override the defaults below
    #[arg(short, long, env = "KCT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// SQLite database file (":memory:" for an ephemeral database)
    #[arg(long, env = "DATABASE_PATH", default_value = "kct.db")]
    pub database_path: String,

    /// Enable development mode (insecure default JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false", action = clap::ArgAction::Set)]
    pub dev_mode: bool,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_EXPIRY_SECONDS", default_value = "604800")]
    pub refresh_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Rate limit window in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value = "60")]
    pub rate_limit_window_secs: u64,

    /// Requests allowed per client and path within one window
    #[arg(long, env = "RATE_LIMIT_MAX_REQUESTS", default_value = "120")]
    pub rate_limit_max_requests: u32,

    /// Login attempts allowed per client within one window
    #[arg(long, env = "LOGIN_RATE_LIMIT_MAX_REQUESTS", default_value = "10")]
    pub login_rate_limit_max_requests: u32,

    /// Seed the demo tenant, users and game catalog on startup
    #[arg(long, env = "SEED_DEMO_DATA", default_value = "true", action = clap::ArgAction::Set)]
    pub seed_demo_data: bool,

    /// Page size used when a list request does not give one
    #[arg(long, env = "DEFAULT_PAGE_SIZE", default_value = "20")]
    pub default_page_size: u32,

    /// Largest page size a client may request
    #[arg(long, env = "MAX_PAGE_SIZE", default_value = "100")]
    pub max_page_size: u32,
}

/// Values accepted from the TOML overlay file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub listen: Option<SocketAddr>,
    pub database_path: Option<String>,
    pub dev_mode: Option<bool>,
    pub jwt_secret: Option<String>,
    pub jwt_expiry_seconds: Option<u64>,
    pub refresh_expiry_seconds: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub rate_limit_window_secs: Option<u64>,
    pub rate_limit_max_requests: Option<u32>,
    pub login_rate_limit_max_requests: Option<u32>,
    pub seed_demo_data: Option<bool>,
    pub default_page_size: Option<u32>,
    pub max_page_size: Option<u32>,
}

impl FileConfig {
    /// Load config overlay from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
    }
}

impl Args {
    /// Apply the TOML overlay named by `--config`, if any
    pub fn with_file_overlay(mut self) -> Result<Self, String> {
        let Some(path) = self.config.clone() else {
            return Ok(self);
        };
        let file = FileConfig::load(&path)?;

        if let Some(v) = file.listen {
            self.listen = v;
        }
        if let Some(v) = file.database_path {
            self.database_path = v;
        }
        if let Some(v) = file.dev_mode {
            self.dev_mode = v;
        }
        if file.jwt_secret.is_some() {
            self.jwt_secret = file.jwt_secret;
        }
        if let Some(v) = file.jwt_expiry_seconds {
            self.jwt_expiry_seconds = v;
        }
        if let Some(v) = file.refresh_expiry_seconds {
            self.refresh_expiry_seconds = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        if let Some(v) = file.log_format {
            self.log_format = v;
        }
        if let Some(v) = file.rate_limit_window_secs {
            self.rate_limit_window_secs = v;
        }
        if let Some(v) = file.rate_limit_max_requests {
            self.rate_limit_max_requests = v;
        }
        if let Some(v) = file.login_rate_limit_max_requests {
            self.login_rate_limit_max_requests = v;
        }
        if let Some(v) = file.seed_demo_data {
            self.seed_demo_data = v;
        }
        if let Some(v) = file.default_page_size {
            self.default_page_size = v;
        }
        if let Some(v) = file.max_page_size {
            self.max_page_size = v;
        }

        Ok(self)
    }

    /// Get effective JWT secret (uses a fixed default in dev mode)
    pub fn effective_jwt_secret(&self) -> Option<String> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => Some(secret.clone()),
            (None, true) => Some(DEV_JWT_SECRET.to_string()),
            (None, false) => None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        match self.effective_jwt_secret() {
            None => return Err("JWT_SECRET is required in production mode".to_string()),
            Some(secret) if secret.len() < MIN_JWT_SECRET_LEN => {
                return Err(format!(
                    "JWT_SECRET must be at least {} characters",
                    MIN_JWT_SECRET_LEN
                ));
            }
            Some(_) => {}
        }

        if self.jwt_expiry_seconds == 0 || self.refresh_expiry_seconds == 0 {
            return Err("Token expiry must be greater than zero".to_string());
        }

        if self.refresh_expiry_seconds < self.jwt_expiry_seconds {
            return Err("REFRESH_EXPIRY_SECONDS must not be shorter than JWT_EXPIRY_SECONDS".to_string());
        }

        if self.rate_limit_window_secs == 0 {
            return Err("RATE_LIMIT_WINDOW_SECS must be greater than zero".to_string());
        }

        if self.rate_limit_max_requests == 0 || self.login_rate_limit_max_requests == 0 {
            return Err("Rate limit thresholds must be greater than zero".to_string());
        }

        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err("DEFAULT_PAGE_SIZE must be between 1 and MAX_PAGE_SIZE".to_string());
        }

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(format!("Unknown LOG_FORMAT '{}', expected text or json", self.log_format));
        }

        Ok(())
    }
}
