use std::sync::Arc;

use crate::{
    config::Config,
    redact::Redactor,
    services::{ChatFailover, EmailSender, ImageUpstream},
    stores::Stores,
};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Rate limiter and verification codes.
    pub stores: Stores,
    /// Chat upstream behind credential failover.
    pub chat: Arc<ChatFailover>,
    /// Image generation upstream.
    pub image: Arc<dyn ImageUpstream>,
    /// Email sender. `None` when SMTP credentials are not configured.
    pub email: Option<Arc<dyn EmailSender>>,
    /// Scrubs upstream secrets from anything logged.
    pub redactor: Arc<Redactor>,
}
