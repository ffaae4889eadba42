//! Email verification codes.
//!
//! One pending code per email address. Issuing again replaces the previous
//! code. A code is consumed on success and dropped once it is found expired;
//! a wrong guess leaves it in place so the user can retry.

use std::{collections::HashMap, sync::Arc, time::Duration, time::Instant};

use parking_lot::Mutex;
use rand::Rng;

use crate::clock::Clock;

pub const CODE_LENGTH: usize = 6;

/// Outcome of a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Code matched and was consumed.
    Verified { privileged: bool },
    NoSuchCode,
    /// Code existed but had expired; it has been removed.
    Expired,
    /// Code exists and is still valid but does not match.
    Mismatch,
}

/// Store for verification code operations.
#[cfg_attr(test, mockall::automock)]
pub trait VerificationStore: Send + Sync {
    /// Generate and remember a fresh code for `email`, replacing any pending one.
    fn issue(&self, email: &str) -> String;

    /// Check `code` against the pending code for `email`.
    fn verify(&self, email: &str, code: &str) -> VerifyOutcome;

    /// Drop every expired record. Returns how many were removed.
    fn purge_expired(&self) -> usize;
}

struct PendingCode {
    code: String,
    expires_at: Instant,
}

type CodeSource = Box<dyn Fn() -> String + Send + Sync>;

/// In-process implementation of VerificationStore.
pub struct InMemoryVerificationStore {
    ttl: Duration,
    privileged_email: Option<String>,
    clock: Arc<dyn Clock>,
    codes: Mutex<HashMap<String, PendingCode>>,
    generate: CodeSource,
}

impl InMemoryVerificationStore {
    pub fn new(ttl: Duration, privileged_email: Option<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            privileged_email: privileged_email
                .map(|email| email.trim().to_lowercase())
                .filter(|email| !email.is_empty()),
            clock,
            codes: Mutex::new(HashMap::new()),
            generate: Box::new(generate_code),
        }
    }

    /// Replace the random generator with a fixed sequence.
    #[cfg(test)]
    pub fn with_code_source(mut self, source: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.generate = Box::new(source);
        self
    }

    fn is_privileged(&self, email: &str) -> bool {
        self.privileged_email
            .as_deref()
            .is_some_and(|privileged| email.to_lowercase() == privileged)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.codes.lock().len()
    }
}

impl VerificationStore for InMemoryVerificationStore {
    fn issue(&self, email: &str) -> String {
        let code = (self.generate)();
        let expires_at = self.clock.now() + self.ttl;

        self.codes.lock().insert(
            email.to_owned(),
            PendingCode {
                code: code.clone(),
                expires_at,
            },
        );

        code
    }

    fn verify(&self, email: &str, code: &str) -> VerifyOutcome {
        let now = self.clock.now();
        let mut codes = self.codes.lock();

        let Some(pending) = codes.get(email) else {
            return VerifyOutcome::NoSuchCode;
        };

        if now >= pending.expires_at {
            codes.remove(email);
            return VerifyOutcome::Expired;
        }

        if pending.code != code {
            return VerifyOutcome::Mismatch;
        }

        codes.remove(email);
        VerifyOutcome::Verified {
            privileged: self.is_privileged(email),
        }
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut codes = self.codes.lock();
        let before = codes.len();

        codes.retain(|_, pending| now < pending.expires_at);

        before - codes.len()
    }
}

/// Six independent, uniformly drawn decimal digits.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| rng.random_range(0..10).to_string())
        .collect()
}
