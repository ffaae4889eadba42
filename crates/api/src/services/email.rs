//! Email relay.
//!
//! Verification codes go out over authenticated SMTP with implicit TLS
//! (lettre). The gateway only composes the text; delivery failures are
//! reported to the caller without retry.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

pub const VERIFICATION_SUBJECT: &str = "Your verification code";

/// Email sender trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send a plain-text email.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Body of the verification email.
pub fn verification_body(code: &str, ttl: Duration) -> String {
    format!(
        "Your verification code is: {}\n\nUse it within {} minutes.\n\nDo not share this code with anyone.",
        code,
        ttl.as_secs().div_ceil(60)
    )
}

/// SMTP implementation of EmailSender.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> Result<Self> {
        let from: Mailbox = username.parse()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
            .port(port)
            .credentials(Credentials::new(username.to_owned(), password.to_owned()))
            .timeout(Some(Duration::from_secs(20)))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailSender for SmtpSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(None, to.parse()?))
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_owned())?;

        self.transport.send(email).await?;

        Ok(())
    }
}
