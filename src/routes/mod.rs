use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::models::{HealthResponse, SessionResponse};
use crate::services::store::{Session, DEFAULT_SESSION};
use crate::AppState;

pub mod analytics;
pub mod cleaning;
pub mod data;
pub mod ml;

pub const SESSION_HEADER: &str = "x-session-id";
const SERVICE_NAME: &str = "analytics_services";

/// The caller's session, picked by the `x-session-id` header.
pub struct CurrentSession(pub Arc<Session>);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_SESSION);
        Ok(CurrentSession(state.sessions.get(id)))
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600))
}

pub fn routes(config: &Config) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/session", post(create_session))
        .nest("/api/data", data::routes())
        .nest("/api/cleaning", cleaning::routes())
        .nest("/api/analytics", analytics::routes())
        .nest("/api/ml", ml::routes())
        .layer(cors_layer(config))
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/api/data", "/api/cleaning", "/api/analytics", "/api/ml"],
    }))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

async fn create_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    Json(SessionResponse {
        session_id: state.sessions.create(),
    })
}
