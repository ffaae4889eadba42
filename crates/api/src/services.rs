//! External service abstractions.
//!
//! Each third-party upstream sits behind a trait so handlers can be tested
//! with mocks.
//!
//! ## Services
//!
//! - **chat** - conversational AI upstream (Gemini), one credential per call
//! - **credentials** - ordered upstream keys with a shared rotation cursor
//! - **failover** - chat delivery that rotates credentials on quota/timeout
//! - **image** - image generation upstream (Pollinations)
//! - **email** - verification code delivery over SMTP
//!
//! ## Usage in Handlers
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let reply = state.chat.send(&message).await?;
//!     let png = state.image.generate(&prompt, random_seed()).await?;
//! }
//! ```

mod chat;
mod credentials;
mod email;
mod failover;
mod image;

pub use chat::GeminiChatClient;
pub use credentials::CredentialRotator;
pub use email::{EmailSender, SmtpSender, VERIFICATION_SUBJECT, verification_body};
pub use failover::{ChatFailover, FailoverError};
pub use image::{ImageError, ImageUpstream, PollinationsClient, random_seed};

pub use chat::DEFAULT_BASE_URL as DEFAULT_CHAT_BASE_URL;
pub use image::DEFAULT_BASE_URL as DEFAULT_IMAGE_BASE_URL;

#[cfg(test)]
pub use chat::{ChatError, MockChatUpstream};
#[cfg(test)]
pub use credentials::Credential;
#[cfg(test)]
pub use email::MockEmailSender;
#[cfg(test)]
pub use image::MockImageUpstream;
