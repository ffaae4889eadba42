//! Ephemeral in-process stores.
//!
//! Everything here lives only in memory and resets on restart. Verification
//! codes are short-lived and rate limits re-arm naturally, so nothing is lost
//! that matters.
//!
//! ## Stores
//!
//! - **rate_limit** - last admitted request per (client, category)
//! - **verification** - pending email verification codes (10 min TTL)
//!
//! ## Usage in Handlers
//!
//! Stores are accessed via `state.stores`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     state.stores.rate_limiter.check(&client, Category::Chat);
//!     let code = state.stores.verification.issue(&email);
//! }
//! ```

mod rate_limit;
mod verification;

pub use rate_limit::{Category, InMemoryRateLimiter, RateLimitResult, RateLimiter, RateLimits};
pub use verification::{InMemoryVerificationStore, VerificationStore, VerifyOutcome};

#[cfg(test)]
pub use rate_limit::MockRateLimiter;
#[cfg(test)]
pub use verification::MockVerificationStore;

use std::{sync::Arc, time::Duration};

/// Collection of all ephemeral stores.
#[derive(Clone)]
pub struct Stores {
    pub verification: Arc<dyn VerificationStore>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl Stores {
    /// Drop stale rate-limit entries and expired codes.
    pub fn sweep(&self) {
        let idle = self.rate_limiter.sweep();
        let expired = self.verification.purge_expired();

        if idle > 0 || expired > 0 {
            tracing::debug!(idle, expired, "swept ephemeral stores");
        }
    }
}

/// Runs [`Stores::sweep`] every `period` until the runtime shuts down.
pub async fn run_sweeper(stores: Stores, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        stores.sweep();
    }
}
