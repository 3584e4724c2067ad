//! Storyloom — HTTP API over the narrative engine.

use axum::Router;

pub mod config;
pub mod error;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod telemetry;

/// Builds the application router without middleware.
pub fn app(state: state::AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/campaigns", routes::campaigns::router())
        .with_state(state)
}
