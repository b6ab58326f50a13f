//! API Module
//!
//! HTTP API layer over the engine.
//! Each submodule handles endpoints for a specific resource.

pub mod builds;
pub mod error;
pub mod health;
pub mod state;
pub mod structure;
pub mod triggers;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use stepwise::engine::Engine;
use tower_http::trace::TraceLayer;

use crate::config::StateMode;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub state_mode: StateMode,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, state_mode: StateMode) -> Self {
        Self { engine, state_mode }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Polling endpoints
        .route("/api/pipeline-state", get(state::get_pipeline_state))
        .route(
            "/api/pipeline-structure",
            get(structure::get_pipeline_structure),
        )
        // Manual steps
        .route("/api/dynamic/{trigger_id}", post(triggers::fire_trigger))
        // Builds
        .route(
            "/api/builds",
            get(builds::list_builds).post(builds::start_build),
        )
        .route(
            "/api/builds/{build_id}",
            get(builds::get_build).delete(builds::discard_build),
        )
        .route(
            "/api/builds/{build_id}/{step_index}/retrigger",
            post(builds::retrigger_step),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
