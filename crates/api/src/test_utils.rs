//! Shared test utilities for API handler tests.
//!
//! `TestStateBuilder` constructs an `AppState` backed by real in-memory stores
//! on a [`ManualClock`] and mock upstreams, so each test only configures the
//! collaborators it exercises.
//!
//! ## Usage
//!
//! ```ignore
//! let mut upstream = MockChatUpstream::new();
//! upstream.expect_send().returning(|_, _| Ok("hi".into()));
//!
//! let builder = TestStateBuilder::new().with_chat_upstream(upstream);
//! let clock = builder.clock();
//! let state = builder.build();
//! ```

use std::sync::Arc;

use axum::response::Response;
use http_body_util::BodyExt;
use parking_lot::Mutex;

use crate::{
    clock::{Clock, ManualClock},
    config::Config,
    redact::Redactor,
    services::{
        ChatFailover, Credential, CredentialRotator, EmailSender, ImageUpstream,
        MockChatUpstream, MockEmailSender, MockImageUpstream,
    },
    state::AppState,
    stores::{
        InMemoryRateLimiter, InMemoryVerificationStore, MockRateLimiter, RateLimiter, Stores,
    },
};

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 5000,
        env: "test".to_string(),
        api_keys: "test-key".to_string(),
        chat_base_url: "http://chat.invalid".to_string(),
        chat_model: "test-model".to_string(),
        chat_timeout_secs: 30,
        image_base_url: "http://image.invalid".to_string(),
        image_timeout_secs: 60,
        image_size: 1024,
        smtp_host: "smtp.invalid".to_string(),
        smtp_port: 465,
        smtp_username: None,
        smtp_password: None,
        privileged_email: None,
        rate_limit_chat_secs: 2,
        rate_limit_image_secs: 5,
        rate_limit_email_secs: 30,
        code_ttl_secs: 600,
        sweep_interval_secs: 300,
        allowed_origins: "http://localhost:8000".to_string(),
        sentry_dsn: None,
        log_file: None,
    }
}

/// Reads a JSON response body.
pub async fn response_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Builder for constructing test `AppState` with custom mocks.
pub struct TestStateBuilder {
    config: Config,
    clock: Arc<ManualClock>,
    credentials: Vec<String>,
    secrets: Vec<String>,
    codes: Option<Vec<&'static str>>,
    rate_limiter: Option<MockRateLimiter>,
    chat_upstream: Option<MockChatUpstream>,
    image_upstream: Option<MockImageUpstream>,
    email_sender: Option<MockEmailSender>,
}

impl TestStateBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            clock: Arc::new(ManualClock::new()),
            credentials: vec!["test-key".to_string()],
            secrets: Vec::new(),
            codes: None,
            rate_limiter: None,
            chat_upstream: None,
            image_upstream: None,
            email_sender: None,
        }
    }

    /// The clock driving the in-memory stores.
    pub fn clock(&self) -> Arc<ManualClock> {
        self.clock.clone()
    }

    pub fn with_credentials(mut self, keys: &[&str]) -> Self {
        self.credentials = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Extra secrets for the redactor besides the chat credentials.
    pub fn with_secrets(mut self, secrets: &[&str]) -> Self {
        self.secrets = secrets.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Codes handed out by the verification store, in order.
    pub fn with_codes(mut self, codes: &[&'static str]) -> Self {
        self.codes = Some(codes.to_vec());
        self
    }

    pub fn with_privileged_email(mut self, email: &str) -> Self {
        self.config.privileged_email = Some(email.to_string());
        self
    }

    pub fn with_rate_limiter(mut self, limiter: MockRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn with_chat_upstream(mut self, upstream: MockChatUpstream) -> Self {
        self.chat_upstream = Some(upstream);
        self
    }

    pub fn with_image_upstream(mut self, upstream: MockImageUpstream) -> Self {
        self.image_upstream = Some(upstream);
        self
    }

    pub fn with_email_sender(mut self, sender: MockEmailSender) -> Self {
        self.email_sender = Some(sender);
        self
    }

    /// Builds the `AppState` using configured mocks or defaults.
    pub fn build(self) -> AppState {
        let clock = self.clock as Arc<dyn Clock>;

        let rate_limiter: Arc<dyn RateLimiter> = match self.rate_limiter {
            Some(mock) => Arc::new(mock),
            None => Arc::new(InMemoryRateLimiter::new(
                self.config.rate_limits(),
                clock.clone(),
            )),
        };

        let mut verification = InMemoryVerificationStore::new(
            self.config.code_ttl(),
            self.config.privileged_email.clone(),
            clock,
        );
        if let Some(codes) = self.codes {
            let queue = Mutex::new(codes.into_iter());
            verification = verification
                .with_code_source(move || queue.lock().next().unwrap_or("000000").to_string());
        }

        let rotator = Arc::new(
            CredentialRotator::new(self.credentials.into_iter().map(Credential::new).collect())
                .expect("test credentials must not be empty"),
        );
        let redactor = Arc::new(Redactor::new(
            rotator
                .secrets()
                .map(str::to_owned)
                .chain(self.secrets)
                .collect::<Vec<_>>(),
        ));

        let chat_upstream = Arc::new(self.chat_upstream.unwrap_or_else(MockChatUpstream::new));
        let image = Arc::new(self.image_upstream.unwrap_or_else(MockImageUpstream::new))
            as Arc<dyn ImageUpstream>;
        let email = self
            .email_sender
            .map(|sender| Arc::new(sender) as Arc<dyn EmailSender>);

        AppState {
            config: self.config,
            stores: Stores {
                verification: Arc::new(verification),
                rate_limiter,
            },
            chat: Arc::new(ChatFailover::new(rotator, chat_upstream, redactor.clone())),
            image,
            email,
            redactor,
        }
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
