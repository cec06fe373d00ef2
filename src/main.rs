//! Back-office server entry point.
//!
//! Wires the stores, the signing secret, and the request-gating
//! middleware into one axum application.

use anyhow::{Context, Result};
use chms_backend::api::{build_router, AppState};
use chms_backend::auth::{JwtHandler, UserStore};
use chms_backend::middleware::{request_logging, RateLimiter};
use chms_backend::store::{FinanceStore, MemberStore};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("🚀 Back-office server starting");

    let db_path = resolve_data_path(env::var("DATABASE_PATH").ok(), "chms.db");
    let jwt_secret = env::var("JWT_SECRET")
        .unwrap_or_else(|_| "dev-secret-change-in-production-minimum-32-characters".to_string());
    let token_ttl_hours = env::var("TOKEN_TTL_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(24);

    let users = Arc::new(UserStore::new(&db_path)?);
    let members = Arc::new(MemberStore::new(&db_path)?);
    let finance = Arc::new(FinanceStore::new(&db_path)?);
    let jwt = Arc::new(JwtHandler::new(jwt_secret).with_expiration_hours(token_ttl_hours));

    let state = AppState {
        users,
        members,
        finance,
        jwt,
    };

    // Login attempts per source address: 5 per 15 minutes
    let login_max = env::var("LOGIN_RATE_MAX")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(5);
    let login_window_secs = env::var("LOGIN_RATE_WINDOW_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(900);
    let login_limiter = RateLimiter::new(login_max, Duration::from_secs(login_window_secs));

    let app = build_router(state, login_limiter)
        .layer(axum::middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    info!("🌐 Listening on {}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chms_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolve a data file location: explicit env value wins, otherwise the
/// default filename next to a DATA_DIR if one is set.
fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    if let Some(path) = env_value {
        return path;
    }

    match env::var("DATA_DIR") {
        Ok(dir) => Path::new(&dir)
            .join(default_filename)
            .to_string_lossy()
            .into_owned(),
        Err(_) => default_filename.to_string(),
    }
}
