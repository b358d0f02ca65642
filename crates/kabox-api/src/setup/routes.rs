//! Route configuration and setup

use crate::constants::{API_PREFIX, FILES_PREFIX, MEDIA_PREFIX, MSG_INVALID_REQUEST};
use crate::error::HttpAppError;
use crate::handlers;
use crate::middleware::{
    rate_limit_middleware, request_id_middleware, security_headers_middleware,
    SecurityHeadersConfig,
};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use kabox_core::{AppError, Config, StorageProvider};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    super::install_attribution(config);

    let cors = setup_cors(config);
    spawn_rate_limit_cleanup(&state);

    let security_headers_config = Arc::new(SecurityHeadersConfig::new(config.is_production()));

    let body_limit = config
        .max_file_size_bytes()
        .saturating_mul(config.max_files_per_upload() as u64)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let mut app = Router::new()
        .nest(API_PREFIX, api_routes(config, state.clone()))
        .route(&format!("{}/{{id}}", FILES_PREFIX), get(handlers::files::get_file))
        .route(
            &format!("{}/{{id}}/{{action}}", FILES_PREFIX),
            get(handlers::files::file_action),
        )
        .route("/health", get(handlers::health::health_check))
        .fallback(not_found);

    if config.storage_providers().contains(&StorageProvider::Local) {
        let path = &config.local_storage().path;
        tracing::info!(path = %path, "Serving local storage under {}", MEDIA_PREFIX);
        app = app.nest_service(MEDIA_PREFIX, ServeDir::new(path));
    }

    let app = app
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn_with_state(
            security_headers_config,
            security_headers_middleware,
        ))
        .with_state(state);

    tracing::info!(body_limit_bytes = body_limit, "Routes configured");
    Ok(app)
}

/// `/api` routes, rate limited per client IP.
fn api_routes(config: &Config, state: Arc<AppState>) -> Router<Arc<AppState>> {
    let mut router = Router::new().route("/upload", post(handlers::upload::upload_files));

    if config.admin_api_key().is_some() {
        router = router.route("/files/{id}", delete(handlers::admin::delete_file));
    } else {
        tracing::info!("ADMIN_API_KEY not set, delete endpoint disabled");
    }

    router.layer(axum::middleware::from_fn_with_state(
        state,
        rate_limit_middleware,
    ))
}

async fn not_found() -> HttpAppError {
    AppError::NotFound(MSG_INVALID_REQUEST.to_string()).into()
}

fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    if config.cors_origins().iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}

/// Periodically drop expired rate-limit buckets. Stops once the state is gone.
fn spawn_rate_limit_cleanup(state: &Arc<AppState>) {
    let limiter = Arc::downgrade(&state.rate_limiter);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            match limiter.upgrade() {
                Some(limiter) => limiter.cleanup_expired_buckets().await,
                None => break,
            }
        }
    });
}
