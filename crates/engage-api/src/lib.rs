//! Engage API crate - axum HTTP server, route handlers, SSE view events.
//!
//! Exposes the conversation controller as a JSON API: patient directory,
//! conversation lifecycle, example prompts, analytics and navigation.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
