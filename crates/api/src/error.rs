use std::{any::Any, sync::Arc, time::Duration};

use axum::{
    Json,
    extract::{Request, State, rejection::JsonRejection},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::api::ErrorResponse;

use crate::{
    redact::Redactor,
    services::{FailoverError, ImageError},
    stores::{Category, VerifyOutcome},
};

#[derive(Debug)]
pub enum AppError {
    /// Internal errors - logged but return generic 500 to user
    Internal(anyhow::Error),
    /// User-facing errors - message is safe to show
    External(StatusCode, &'static str),
    /// Validation errors - safe to show
    Validation(String),
    /// Client must wait before retrying this category
    RateLimited {
        category: Category,
        remaining: Duration,
    },
}

impl AppError {
    /// Malformed or missing JSON body.
    pub fn bad_body(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected request body");
        Self::Validation("Invalid request body".to_string())
    }

    /// Whole seconds to wait, never zero.
    fn retry_after_secs(remaining: Duration) -> u64 {
        (remaining.as_secs_f64().ceil() as u64).max(1)
    }

    /// Chat failure. Exhaustion is reported apart from single-attempt failures.
    pub fn chat(err: FailoverError) -> Self {
        match err {
            FailoverError::Exhausted { .. } => AppError::External(
                StatusCode::SERVICE_UNAVAILABLE,
                "The service is busy right now. Please try again shortly.",
            ),
            FailoverError::Timeout { .. } => AppError::External(
                StatusCode::GATEWAY_TIMEOUT,
                "The request timed out. Please try again.",
            ),
            FailoverError::Unreachable { .. } | FailoverError::Rejected { .. } => {
                AppError::External(
                    StatusCode::BAD_GATEWAY,
                    "The AI service cannot respond right now. Please try again.",
                )
            }
        }
    }

    pub fn image(err: ImageError) -> Self {
        match err {
            ImageError::ServiceLoading => AppError::External(
                StatusCode::SERVICE_UNAVAILABLE,
                "Image service is warming up. Try again in 20 seconds.",
            ),
            ImageError::Timeout => AppError::External(
                StatusCode::GATEWAY_TIMEOUT,
                "Image generation timed out. Please try again.",
            ),
            ImageError::Status(_) | ImageError::Transport(_) => AppError::External(
                StatusCode::BAD_GATEWAY,
                "Could not generate the image. Please try again.",
            ),
        }
    }

    /// Failure for a verification outcome other than success.
    pub fn from_verify(outcome: VerifyOutcome) -> Option<Self> {
        let message = match outcome {
            VerifyOutcome::Verified { .. } => return None,
            VerifyOutcome::NoSuchCode => "Invalid or expired code",
            VerifyOutcome::Expired => "Code expired. Request a new one.",
            VerifyOutcome::Mismatch => "Incorrect verification code",
        };
        Some(AppError::External(StatusCode::BAD_REQUEST, message))
    }
}

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Unscrubbed detail of an internal error, attached to its response.
#[derive(Clone)]
struct InternalDetail(Arc<anyhow::Error>);

/// Error text with every known secret removed, safe for logs and Sentry.
pub fn scrubbed_detail(redactor: &Redactor, err: &anyhow::Error) -> String {
    redactor.scrub(&format!("{:#}", err))
}

/// Logs and reports internal errors after scrubbing, and strips the raw
/// detail from the response.
pub async fn report_internal_errors(
    State(redactor): State<Arc<Redactor>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    if let Some(InternalDetail(err)) = response.extensions_mut().remove::<InternalDetail>() {
        let detail = scrubbed_detail(&redactor, &err);
        tracing::error!("internal error: {}", detail);
        sentry::capture_message(&detail, sentry::Level::Error);
    }

    response
}

/// Turns a handler panic into the generic 500 body.
pub fn panic_response(redactor: &Redactor, panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    let detail = redactor.scrub(detail);

    tracing::error!("handler panicked: {}", detail);
    sentry::capture_message(&detail, sentry::Level::Fatal);

    body(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE)
}

fn body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(err) => {
                let mut response = body(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE);
                // Reported by `report_internal_errors`, which can scrub it.
                response
                    .extensions_mut()
                    .insert(InternalDetail(Arc::new(err)));
                response
            }
            AppError::External(status, msg) => body(status, msg),
            AppError::Validation(msg) => body(StatusCode::BAD_REQUEST, msg),
            AppError::RateLimited {
                category,
                remaining,
            } => {
                let secs = Self::retry_after_secs(remaining);
                let message = match category {
                    Category::Chat => format!(
                        "You are sending messages too quickly. Please wait {} seconds.",
                        secs
                    ),
                    Category::Image => format!(
                        "You are generating images too often. Please wait {} seconds.",
                        secs
                    ),
                    Category::Email => {
                        format!("Too many requests. Try again in {} seconds.", secs)
                    }
                };

                let mut response = body(StatusCode::TOO_MANY_REQUESTS, message);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, header::HeaderValue::from(secs));
                response
            }
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}
