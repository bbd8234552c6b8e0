//! kct-server - curriculum framework REST service

use clap::Parser;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use kct_server::{config::Args, db, logging, server, AppState};

/// How often expired rate-limit windows and revoked tokens are pruned
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = match Args::parse().with_file_overlay() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    logging::init(&args.log_level, &args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  kct-server {}", env!("CARGO_PKG_VERSION"));
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Database: {}", args.database_path);
    info!("Token expiry: {}s (refresh {}s)", args.jwt_expiry_seconds, args.refresh_expiry_seconds);
    info!(
        "Rate limit: {} req / {}s per client and path (login {})",
        args.rate_limit_max_requests, args.rate_limit_window_secs, args.login_rate_limit_max_requests
    );
    info!("Page size: default {}, max {}", args.default_page_size, args.max_page_size);
    info!("======================================");

    if args.dev_mode && args.jwt_secret.is_none() {
        warn!("Using the built-in development JWT secret");
    }

    let database = db::Database::open(&args.database_path)?;

    if args.seed_demo_data {
        db::seed::seed_demo_data(&database)?;
    }

    let state = AppState::new(args, database)?;

    // Periodic cleanup of limiter windows and expired revocations
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup_state.limits.cleanup();
            let now = chrono::Utc::now().timestamp();
            match cleanup_state
                .db
                .with_conn(|conn| db::users::prune_revoked(conn, now))
            {
                Ok(pruned) => debug!(pruned, "Pruned expired token revocations"),
                Err(e) => warn!("Failed to prune revoked tokens: {}", e),
            }
        }
    });

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
