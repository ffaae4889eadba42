//! Conversational AI upstream (Gemini `generateContent`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::credentials::Credential;

/// Why a single chat attempt failed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChatError {
    /// The credential has hit its usage cap (HTTP 429).
    #[error("credential quota exhausted")]
    QuotaExceeded,
    #[error("request timed out")]
    Timeout,
    /// Any other non-success HTTP status.
    #[error("upstream returned status {0}")]
    Status(u16),
    /// Connection failure or an unreadable response body.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// AI chat upstream trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatUpstream: Send + Sync {
    /// Send one user message with the given credential and return the reply text.
    async fn send(&self, credential: &Credential, message: &str) -> Result<String, ChatError>;
}

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini implementation of ChatUpstream.
pub struct GeminiChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiChatClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ChatUpstream for GeminiChatClient {
    async fn send(&self, credential: &Credential, message: &str) -> Result<String, ChatError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: message }],
            }],
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(ChatError::QuotaExceeded),
            status => return Err(ChatError::Status(status.as_u16())),
        }

        let body: GenerateResponse = response.json().await.map_err(transport_error)?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| ChatError::Transport("response contained no candidate text".into()))
    }
}

fn transport_error(err: reqwest::Error) -> ChatError {
    if err.is_timeout() {
        ChatError::Timeout
    } else {
        ChatError::Transport(err.without_url().to_string())
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    fn client(server: &MockServer, timeout: Duration) -> GeminiChatClient {
        GeminiChatClient::new(server.uri(), "test-model", timeout).unwrap()
    }

    #[tokio::test]
    async fn returns_first_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model:generateContent"))
            .and(header("x-goog-api-key", "k1"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "hi there" }] } }]
            })))
            .mount(&server)
            .await;

        let reply = client(&server, Duration::from_secs(5))
            .send(&Credential::new("k1"), "hello")
            .await;

        assert_eq!(reply, Ok("hi there".to_string()));
    }

    #[tokio::test]
    async fn too_many_requests_is_quota_exceeded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = client(&server, Duration::from_secs(5))
            .send(&Credential::new("k1"), "hello")
            .await;

        assert_eq!(result, Err(ChatError::QuotaExceeded));
    }

    #[tokio::test]
    async fn other_status_is_reported_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let result = client(&server, Duration::from_secs(5))
            .send(&Credential::new("k1"), "hello")
            .await;

        assert_eq!(result, Err(ChatError::Status(400)));
    }

    #[tokio::test]
    async fn slow_upstream_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&server)
            .await;

        let result = client(&server, Duration::from_millis(50))
            .send(&Credential::new("k1"), "hello")
            .await;

        assert_eq!(result, Err(ChatError::Timeout));
    }

    #[tokio::test]
    async fn empty_candidates_is_a_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&server)
            .await;

        let result = client(&server, Duration::from_secs(5))
            .send(&Credential::new("k1"), "hello")
            .await;

        assert!(matches!(result, Err(ChatError::Transport(_))));
    }
}
