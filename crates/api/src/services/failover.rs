//! Chat delivery with credential failover.
//!
//! A request starts on the rotator's current credential. Quota exhaustion,
//! timeouts and transport failures rotate to the next credential and retry,
//! sequentially, until every credential has been tried once. Any other
//! upstream status ends the request immediately without rotating.

use std::sync::Arc;

use super::{
    chat::{ChatError, ChatUpstream},
    credentials::CredentialRotator,
};
use crate::redact::Redactor;

/// Successful chat delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    /// Number of upstream calls made, including the successful one.
    pub attempts: usize,
}

/// Terminal failure of a chat request.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FailoverError {
    /// Every credential reported quota exhaustion.
    #[error("all credentials exhausted after {attempts} attempts")]
    Exhausted { attempts: usize },
    /// The retry budget ran out and the final attempt timed out.
    #[error("upstream timed out ({attempts} attempts)")]
    Timeout { attempts: usize },
    /// The retry budget ran out and the final attempt could not reach the upstream.
    #[error("upstream unreachable ({attempts} attempts)")]
    Unreachable { attempts: usize },
    /// Non-retryable upstream status.
    #[error("upstream rejected the request with status {status}")]
    Rejected { status: u16 },
}

pub struct ChatFailover {
    rotator: Arc<CredentialRotator>,
    upstream: Arc<dyn ChatUpstream>,
    redactor: Arc<Redactor>,
}

impl ChatFailover {
    pub fn new(
        rotator: Arc<CredentialRotator>,
        upstream: Arc<dyn ChatUpstream>,
        redactor: Arc<Redactor>,
    ) -> Self {
        Self {
            rotator,
            upstream,
            redactor,
        }
    }

    pub fn credential_count(&self) -> usize {
        self.rotator.len()
    }

    pub async fn send(&self, message: &str) -> Result<ChatReply, FailoverError> {
        let budget = self.rotator.len();
        let mut credential = self.rotator.current();
        let mut attempts = 0;

        loop {
            let key = self.rotator.position() + 1;
            attempts += 1;

            let err = match self.upstream.send(&credential, message).await {
                Ok(text) => {
                    tracing::info!(key, total = budget, attempts, "chat upstream answered");
                    return Ok(ChatReply { text, attempts });
                }
                Err(ChatError::Status(status)) => {
                    tracing::error!(key, total = budget, status, "chat upstream rejected request");
                    return Err(FailoverError::Rejected { status });
                }
                Err(err) => err,
            };

            tracing::warn!(
                key,
                total = budget,
                attempts,
                error = %self.redactor.scrub_error(&err),
                "chat attempt failed, rotating credential"
            );
            credential = self.rotator.advance();

            if attempts >= budget {
                tracing::error!(attempts, "chat retry budget spent");
                return Err(match err {
                    ChatError::Timeout => FailoverError::Timeout { attempts },
                    ChatError::Transport(_) => FailoverError::Unreachable { attempts },
                    _ => FailoverError::Exhausted { attempts },
                });
            }
        }
    }
}
