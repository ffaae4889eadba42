//! Health check endpoint for load balancers and monitoring.
//!
//! The gateway has no backing database, so being able to answer is the
//! health signal. The number of loaded chat credentials is included.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use chrono::Utc;
use shared::api::HealthResponse;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        credentials_loaded: state.chat.credential_count(),
    })
}
