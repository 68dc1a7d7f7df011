//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use engage_core::config::EngageConfig;
use engage_core::error::EngageError;

use crate::handlers;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Localhost origins on the serving port and the one above it for a dev UI.
    let port = state.config.general.port;
    let dev_port = port.saturating_add(1);
    let origins: Vec<HeaderValue> = [port, dev_port]
        .iter()
        .flat_map(|p| {
            [
                format!("http://127.0.0.1:{}", p),
                format!("http://localhost:{}", p),
            ]
        })
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/patients", get(handlers::patients));

    let limiter = RateLimiter::new(state.config.chat.requests_per_second);

    let rate_limited_routes = Router::new()
        .route("/view", get(handlers::view))
        .route("/conversation/start", post(handlers::start_conversation))
        .route("/conversation/simulate", post(handlers::simulate))
        .route("/conversation/messages", post(handlers::send_message))
        .route("/conversation/conversion", post(handlers::record_conversion))
        .route("/conversation/appointment", post(handlers::record_appointment))
        .route("/conversation/end", post(handlers::end_conversation))
        .route("/prompts", get(handlers::prompts))
        .route("/prompts/generate", post(handlers::generate_prompts))
        .route("/analytics", get(handlers::analytics))
        .route("/navigate", post(handlers::navigate))
        .layer(axum::middleware::from_fn(
            crate::rate_limit::rate_limit_middleware,
        ))
        .layer(axum::Extension(limiter));

    // SSE stream exempt from rate limiting.
    let stream_routes = Router::new().route("/events", get(handlers::events));

    public_routes
        .merge(rate_limited_routes)
        .merge(stream_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind to the configured address and serve until the process exits.
pub async fn start_server(config: &EngageConfig, state: AppState) -> Result<(), EngageError> {
    let addr = format!("{}:{}", config.general.bind_address, config.general.port);

    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| EngageError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| EngageError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
