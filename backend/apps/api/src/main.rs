//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use auth::{AuthConfig, PgCredentialStore, auth_router};
use axum::{
    Router, http,
    http::{HeaderName, Method, header},
};
use base64::Engine;
use base64::engine::general_purpose;
use platform::csrf::CsrfConfig;
use platform::password::{BcryptPasswordHasher, PasswordHasher};
use platform::password_policy::{DEFAULT_MIN_LENGTH, PasswordPolicy};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,platform=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    // Startup cleanup: remove expired sessions and spent reset tokens
    // Errors here should not prevent server startup
    let auth_store = PgCredentialStore::new(pool.clone());
    match auth_store.cleanup_expired().await {
        Ok(deleted) => {
            tracing::info!(rows_deleted = deleted, "Auth cleanup completed");
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Auth cleanup failed, continuing anyway"
            );
        }
    }

    // Auth configuration
    let cookie_secure = match env::var("AUTH_COOKIE_SECURE") {
        Ok(value) => parse_bool(&value).context("AUTH_COOKIE_SECURE must be true or false")?,
        Err(_) => !cfg!(debug_assertions),
    };

    let mut auth_config = AuthConfig {
        cookie_secure,
        ..AuthConfig::default()
    };
    if let Some(policy) = password_policy_from_env()? {
        auth_config = auth_config.with_password_policy(policy);
    }

    let hasher: Arc<dyn PasswordHasher> = match env::var("BCRYPT_COST") {
        Ok(value) => {
            let cost = u32::from_str(value.trim()).context("BCRYPT_COST must be a number")?;
            anyhow::ensure!(
                (BcryptPasswordHasher::MIN_COST..=31).contains(&cost),
                "BCRYPT_COST must be between {} and 31",
                BcryptPasswordHasher::MIN_COST
            );
            Arc::new(BcryptPasswordHasher::new(cost))
        }
        Err(_) => Arc::new(BcryptPasswordHasher::default()),
    };

    // CSRF configuration
    let csrf_config = match env::var("CSRF_SECRET") {
        Ok(secret_b64) => {
            let secret = Engine::decode(&general_purpose::STANDARD, secret_b64.trim())
                .context("CSRF_SECRET must be base64")?;
            anyhow::ensure!(secret.len() >= 32, "CSRF_SECRET must decode to at least 32 bytes");
            CsrfConfig {
                cookie_secure,
                ..CsrfConfig::new(secret)
            }
        }
        Err(_) if cfg!(debug_assertions) => {
            tracing::warn!("CSRF_SECRET not set, using a random secret");
            CsrfConfig {
                cookie_secure,
                ..CsrfConfig::with_random_secret()
            }
        }
        Err(_) => anyhow::bail!("CSRF_SECRET must be set in production"),
    };

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let csrf_header = HeaderName::from_str(&csrf_config.header_name)
        .context("CSRF header name is not a valid header")?;

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            csrf_header,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest(
            "/api/auth",
            auth_router(auth_store, hasher, auth_config, csrf_config),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = match env::var("BIND_ADDR") {
        Ok(value) => SocketAddr::from_str(value.trim()).context("BIND_ADDR must be host:port")?,
        Err(_) => SocketAddr::from(([0, 0, 0, 0], 31113)),
    };
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Strength policy from `PASSWORD_MIN_LENGTH` / `PASSWORD_REQUIRED_CHARS`;
/// `None` when neither is set
fn password_policy_from_env() -> anyhow::Result<Option<PasswordPolicy>> {
    let min_length = env::var("PASSWORD_MIN_LENGTH").ok();
    let required_chars = env::var("PASSWORD_REQUIRED_CHARS").ok();

    if min_length.is_none() && required_chars.is_none() {
        return Ok(None);
    }

    let mut policy = PasswordPolicy::default();
    if let Some(value) = min_length {
        policy.min_length = value
            .trim()
            .parse()
            .with_context(|| format!("PASSWORD_MIN_LENGTH must be a number (default {DEFAULT_MIN_LENGTH})"))?;
    }
    if let Some(groups) = required_chars {
        policy = policy.with_required_chars(&groups);
    }

    Ok(Some(policy))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
