//! Upstream credential rotation.
//!
//! The rotation cursor is shared by every request: one request rotating past
//! a quota-limited key changes where the next request starts.

use std::fmt;

use parking_lot::Mutex;

/// Opaque upstream access key. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no upstream credentials configured")]
    Empty,
}

/// Ordered, non-empty set of credentials with a wrapping cursor.
pub struct CredentialRotator {
    credentials: Vec<Credential>,
    cursor: Mutex<usize>,
}

impl CredentialRotator {
    pub fn new(credentials: Vec<Credential>) -> Result<Self, CredentialError> {
        if credentials.is_empty() {
            return Err(CredentialError::Empty);
        }

        Ok(Self {
            credentials,
            cursor: Mutex::new(0),
        })
    }

    /// Parse a comma-separated list, trimming entries and skipping blanks.
    pub fn from_list(raw: &str) -> Result<Self, CredentialError> {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(Credential::new)
                .collect(),
        )
    }

    /// Credential at the cursor.
    pub fn current(&self) -> Credential {
        let cursor = self.cursor.lock();
        self.credentials[*cursor].clone()
    }

    /// Move the cursor forward (wrapping) and return the credential now under it.
    pub fn advance(&self) -> Credential {
        let mut cursor = self.cursor.lock();
        *cursor = (*cursor + 1) % self.credentials.len();
        self.credentials[*cursor].clone()
    }

    /// Zero-based cursor position, for logging.
    pub fn position(&self) -> usize {
        *self.cursor.lock()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Raw secret values, for building a redactor.
    pub fn secrets(&self) -> impl Iterator<Item = &str> {
        self.credentials.iter().map(Credential::expose)
    }
}

impl fmt::Debug for CredentialRotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRotator")
            .field("count", &self.credentials.len())
            .field("position", &self.position())
            .finish()
    }
}
