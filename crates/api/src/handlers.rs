//! HTTP request handlers.
//!
//! Thin adapters: extract, consult the stores and services on `AppState`,
//! shape the response. Everything user-facing is a pre-written message;
//! upstream error text only ever reaches the (scrubbed) logs.

pub mod auth;
pub mod chat;
pub mod health;
pub mod image;

use axum::http::StatusCode;

use crate::{
    error::AppError,
    state::AppState,
    stores::{Category, RateLimitResult},
};

/// Gate a request on the client's rate limit for `category`.
pub(crate) fn admit(state: &AppState, client: &str, category: Category) -> Result<(), AppError> {
    match state.stores.rate_limiter.check(client, category) {
        RateLimitResult::Allowed => Ok(()),
        RateLimitResult::Exceeded { remaining } => {
            tracing::warn!(
                client,
                %category,
                remaining_secs = remaining.as_secs_f64(),
                "rate limited"
            );
            Err(AppError::RateLimited {
                category,
                remaining,
            })
        }
    }
}

/// Fallback for unknown routes.
pub async fn not_found() -> AppError {
    AppError::External(StatusCode::NOT_FOUND, "Endpoint not found")
}
