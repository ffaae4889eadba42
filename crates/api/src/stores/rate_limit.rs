//! Per-client admission control.
//!
//! Each (client, category) pair remembers when its last request was admitted.
//! A request is admitted only when at least the category's minimum interval has
//! passed since then. Rejections never touch the stored timestamp.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration, time::Instant};

use parking_lot::Mutex;

use crate::clock::Clock;

/// Operation class used to pick an independent threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Chat,
    Image,
    Email,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Chat => "chat",
            Category::Image => "image",
            Category::Email => "email",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum spacing between admitted requests, per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub chat: Duration,
    pub image: Duration,
    pub email: Duration,
}

impl RateLimits {
    pub fn interval(&self, category: Category) -> Duration {
        match category {
            Category::Chat => self.chat,
            Category::Image => self.image,
            Category::Email => self.email,
        }
    }

    /// The largest configured interval. Entries idle for longer than this
    /// can no longer cause a rejection.
    pub fn longest(&self) -> Duration {
        self.chat.max(self.image).max(self.email)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Admitted; the admission time has been recorded.
    Allowed,
    /// Too soon. `remaining` is always in `(0, interval]`.
    Exceeded { remaining: Duration },
}

impl RateLimitResult {
    #[cfg(test)]
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed)
    }
}

/// Rate limiter trait for admitting requests.
#[cfg_attr(test, mockall::automock)]
pub trait RateLimiter: Send + Sync {
    /// Check and, if admitted, record a request from `client` in `category`.
    fn check(&self, client: &str, category: Category) -> RateLimitResult;

    /// Remove entries that can no longer reject anything. Returns how many were dropped.
    fn sweep(&self) -> usize;
}

/// In-process implementation of RateLimiter.
pub struct InMemoryRateLimiter {
    limits: RateLimits,
    clock: Arc<dyn Clock>,
    last_admitted: Mutex<HashMap<(String, Category), Instant>>,
}

impl InMemoryRateLimiter {
    pub fn new(limits: RateLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits,
            clock,
            last_admitted: Mutex::new(HashMap::new()),
        }
    }

    /// Category-agnostic gate. The elapsed check and the timestamp update
    /// happen under one guard so concurrent requests cannot both pass.
    pub fn check_and_admit(
        &self,
        client: &str,
        category: Category,
        min_interval: Duration,
    ) -> RateLimitResult {
        let now = self.clock.now();
        let key = (client.to_owned(), category);
        let mut table = self.last_admitted.lock();

        if let Some(last) = table.get(&key) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < min_interval {
                return RateLimitResult::Exceeded {
                    remaining: min_interval - elapsed,
                };
            }
        }

        table.insert(key, now);
        RateLimitResult::Allowed
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.last_admitted.lock().len()
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check(&self, client: &str, category: Category) -> RateLimitResult {
        self.check_and_admit(client, category, self.limits.interval(category))
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let horizon = self.limits.longest();
        let mut table = self.last_admitted.lock();
        let before = table.len();

        table.retain(|_, last| now.saturating_duration_since(*last) < horizon);

        before - table.len()
    }
}
