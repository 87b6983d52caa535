//! Route configuration and setup

use crate::api_doc::ApiDoc;
use crate::constants::{
    API_PREFIX, DEFAULT_HTTP_CONCURRENCY_LIMIT, MAX_BODY_BYTES, WEBHOOK_PATH,
};
use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use vidflow_core::{Config, StorageBackend};

/// Handler routes without transport layers. Tests drive this directly.
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .route(
            WEBHOOK_PATH,
            post(handlers::webhooks::receive_provider_webhook),
        )
        .route(
            &format!("{}/videos", API_PREFIX),
            post(handlers::videos::create_video),
        )
        .route(
            &format!("{}/videos/uploads", API_PREFIX),
            post(handlers::videos::create_upload_slot),
        )
        .route(
            &format!("{}/videos/{{id}}", API_PREFIX),
            get(handlers::videos::get_video),
        )
        .route(
            &format!("{}/videos/{{id}}/remote", API_PREFIX),
            delete(handlers::videos::delete_remote_asset),
        )
        .route(
            &format!("{}/videos/{{id}}/thumbnail", API_PREFIX),
            post(handlers::videos::generate_thumbnail),
        )
        .with_state(state)
}

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let mut app = api_routes(state);

    // Local backend files (sources and posters) are served by this process.
    if config.storage_backend().unwrap_or(StorageBackend::Local) == StorageBackend::Local {
        if let Some(path) = config.local_storage_path() {
            app = app.nest_service("/media", ServeDir::new(path));
        }
    }

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_HTTP_CONCURRENCY_LIMIT)
        .max(1);

    let app = app
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(setup_cors(config))
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring unparsable CORS origin");
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
