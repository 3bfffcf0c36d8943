use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub consumer_state: &'static str,
    pub consuming: bool,
}

/// Liveness: healthy whenever the process serves requests. Deliberately
/// independent of the consumer's connection state, so a broker outage or an
/// exhausted retry budget never makes the HTTP surface look unhealthy.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Analytics Service is healthy".to_string(),
        service: "analytics-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness: reports whether the background consumer is currently attached
/// to the broker and consuming.
pub async fn readiness(State(state): State<AppState>) -> Json<ReadinessResponse> {
    let consumer_state = state.consumer_status.state();
    Json(ReadinessResponse {
        consumer_state: consumer_state.as_str(),
        consuming: state.consumer_status.is_consuming(),
    })
}
