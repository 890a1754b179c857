use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::SessionRegistry;

// Application state
pub struct AppState {
    pub config: Config,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let sessions = SessionRegistry::new(config.max_sessions, config.session_ttl);
        Self { config, sessions }
    }
}

pub fn build_app(config: Config) -> Router {
    let body_limit = config.max_file_size;
    let state = Arc::new(AppState::new(config));

    routes::routes(&state.config)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
