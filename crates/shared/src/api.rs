//! Shared API request/response types used by the gateway and its clients.

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Deserializer, Serialize};

/// Request a verification code for an email address.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SendCodePayload {
    #[garde(email)]
    #[serde(default, deserialize_with = "trimmed")]
    pub email: String,
}

/// Submit the verification code received via email.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VerifyCodePayload {
    #[garde(length(min = 1))]
    #[serde(default, deserialize_with = "trimmed")]
    pub email: String,
    #[garde(length(min = 1))]
    #[serde(default, deserialize_with = "trimmed")]
    pub code: String,
}

/// A single user message for the chat upstream.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ChatPayload {
    #[garde(length(min = 1))]
    #[serde(default, deserialize_with = "trimmed")]
    pub message: String,
}

/// Image generation request.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ImagePayload {
    #[garde(length(min = 1))]
    #[serde(default, deserialize_with = "trimmed")]
    pub prompt: String,
}

/// Generic acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// Returned after a code is accepted. `is_privileged` drives authorization
/// decisions on the caller's side.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyCodeResponse {
    pub success: bool,
    pub message: String,
    pub is_privileged: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
}

/// `image` is a `data:image/png;base64,...` URI.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageResponse {
    pub success: bool,
    pub image: String,
}

/// Failure body shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub credentials_loaded: usize,
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_owned())
}
