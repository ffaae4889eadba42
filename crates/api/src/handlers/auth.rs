//! Email verification.
//!
//! Flow:
//! 1. User requests a code via POST /send-code with their email
//! 2. A 6-digit code is generated and kept in memory for 10 minutes,
//!    replacing any code still pending for that email
//! 3. The code is emailed to the user
//! 4. User submits email + code to POST /verify-code
//! 5. On a match the code is consumed and the response says whether the
//!    email is the privileged identity
//!
//! Notes:
//! - /send-code is rate limited per client; /verify-code is not
//! - A wrong code leaves the pending code in place so the user can retry
//! - An expired code is removed the first time it is presented

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use garde::Validate;
use shared::api::{MessageResponse, SendCodePayload, VerifyCodePayload, VerifyCodeResponse};

use crate::{
    error::AppError,
    handlers::admit,
    middleware::client::ClientKey,
    services::{VERIFICATION_SUBJECT, verification_body},
    state::AppState,
    stores::{Category, VerifyOutcome},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send-code", post(send_code))
        .route("/verify-code", post(verify_code))
}

async fn send_code(
    ClientKey(client): ClientKey,
    State(state): State<AppState>,
    payload: Result<Json<SendCodePayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    admit(&state, &client, Category::Email)?;

    let Json(payload) = payload.map_err(AppError::bad_body)?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let Some(email) = state.email.clone() else {
        tracing::error!("verification requested but SMTP is not configured");
        return Err(AppError::External(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Email service is not configured",
        ));
    };

    let code = state.stores.verification.issue(&payload.email);
    let body = verification_body(&code, state.config.code_ttl());

    if let Err(e) = email
        .send(&payload.email, VERIFICATION_SUBJECT, &body)
        .await
    {
        tracing::error!(
            email = %payload.email,
            error = %state.redactor.scrub(&format!("{:#}", e)),
            "failed to send verification code"
        );
        return Err(AppError::External(
            StatusCode::BAD_GATEWAY,
            "Could not send email. Please try again.",
        ));
    }

    tracing::info!(email = %payload.email, "verification code sent");

    Ok(Json(MessageResponse {
        success: true,
        message: "Verification code sent".to_string(),
    }))
}

async fn verify_code(
    State(state): State<AppState>,
    payload: Result<Json<VerifyCodePayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(AppError::bad_body)?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let outcome = state
        .stores
        .verification
        .verify(&payload.email, &payload.code);

    if let Some(err) = AppError::from_verify(outcome) {
        tracing::warn!(email = %payload.email, ?outcome, "verification failed");
        return Err(err);
    }
    let privileged = matches!(outcome, VerifyOutcome::Verified { privileged: true });

    tracing::info!(email = %payload.email, privileged, "email verified");

    Ok(Json(VerifyCodeResponse {
        success: true,
        message: "Verification successful".to_string(),
        is_privileged: privileged,
    }))
}
