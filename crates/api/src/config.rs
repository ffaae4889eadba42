use std::time::Duration;

use serde::Deserialize;

use crate::{
    services::{DEFAULT_CHAT_BASE_URL, DEFAULT_IMAGE_BASE_URL},
    stores::RateLimits,
};

/// Environment prefix for every setting, e.g. `GATEWAY_PORT`.
pub const ENV_PREFIX: &str = "GATEWAY_";

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Comma-separated chat upstream keys. At least one is required.
    pub api_keys: String,
    #[serde(default = "default_chat_base_url")]
    pub chat_base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_chat_timeout_secs")]
    pub chat_timeout_secs: u64,
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,
    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Sender address, also used as the SMTP login.
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    /// Address that is flagged as privileged after verification.
    #[serde(default)]
    pub privileged_email: Option<String>,
    #[serde(default = "default_rate_limit_chat_secs")]
    pub rate_limit_chat_secs: u64,
    #[serde(default = "default_rate_limit_image_secs")]
    pub rate_limit_image_secs: u64,
    #[serde(default = "default_rate_limit_email_secs")]
    pub rate_limit_email_secs: u64,
    #[serde(default = "default_code_ttl_secs")]
    pub code_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Comma-separated CORS origins.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
    /// Sentry DSN for error tracking
    #[serde(default)]
    pub sentry_dsn: Option<String>,
    /// Also append plain-text logs to this file.
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed(ENV_PREFIX).from_env::<Config>()
    }

    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    pub fn rate_limits(&self) -> RateLimits {
        RateLimits {
            chat: Duration::from_secs(self.rate_limit_chat_secs),
            image: Duration::from_secs(self.rate_limit_image_secs),
            email: Duration::from_secs(self.rate_limit_email_secs),
        }
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::from_secs(self.code_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Username and password, when both are set and non-empty.
    pub fn smtp_credentials(&self) -> Option<(&str, &str)> {
        let username = self.smtp_username.as_deref().filter(|u| !u.is_empty())?;
        let password = self.smtp_password.as_deref().filter(|p| !p.is_empty())?;
        Some((username, password))
    }

    pub fn log_file(&self) -> Option<&str> {
        self.log_file.as_deref().map(str::trim).filter(|path| !path.is_empty())
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_chat_base_url() -> String {
    DEFAULT_CHAT_BASE_URL.to_string()
}

fn default_chat_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_chat_timeout_secs() -> u64 {
    30
}

fn default_image_base_url() -> String {
    DEFAULT_IMAGE_BASE_URL.to_string()
}

fn default_image_timeout_secs() -> u64 {
    60
}

fn default_image_size() -> u32 {
    1024
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

fn default_rate_limit_chat_secs() -> u64 {
    2
}

fn default_rate_limit_image_secs() -> u64 {
    5
}

fn default_rate_limit_email_secs() -> u64 {
    30
}

fn default_code_ttl_secs() -> u64 {
    10 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_allowed_origins() -> String {
    "http://localhost:8000".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, envy::Error> {
        envy::prefixed(ENV_PREFIX).from_iter(
            pairs
                .iter()
                .map(|(k, v)| (format!("{}{}", ENV_PREFIX, k), v.to_string())),
        )
    }

    #[test]
    fn defaults_apply_when_only_keys_are_set() {
        let config = from_pairs(&[("API_KEYS", "k1,k2")]).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(
            config.rate_limits(),
            RateLimits {
                chat: Duration::from_secs(2),
                image: Duration::from_secs(5),
                email: Duration::from_secs(30),
            }
        );
        assert_eq!(config.code_ttl(), Duration::from_secs(600));
        assert_eq!(config.chat_timeout(), Duration::from_secs(30));
        assert_eq!(config.image_timeout(), Duration::from_secs(60));
        assert_eq!(config.allowed_origins(), vec!["http://localhost:8000"]);
        assert!(config.smtp_credentials().is_none());
        assert!(config.log_file().is_none());
    }

    #[test]
    fn log_file_is_optional_and_trimmed() {
        let config = from_pairs(&[("API_KEYS", "k1"), ("LOG_FILE", " backend.log ")]).unwrap();
        assert_eq!(config.log_file(), Some("backend.log"));

        let config = from_pairs(&[("API_KEYS", "k1"), ("LOG_FILE", "")]).unwrap();
        assert!(config.log_file().is_none());
    }

    #[test]
    fn missing_keys_fail_to_load() {
        assert!(from_pairs(&[("PORT", "8080")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = from_pairs(&[
            ("API_KEYS", "k1"),
            ("PORT", "8080"),
            ("RATE_LIMIT_CHAT_SECS", "7"),
            ("SMTP_USERNAME", "bot@example.com"),
            ("SMTP_PASSWORD", "pw"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("ENV", "production"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.rate_limits().chat, Duration::from_secs(7));
        assert_eq!(config.smtp_credentials(), Some(("bot@example.com", "pw")));
        assert_eq!(
            config.allowed_origins(),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(config.is_production());
    }

    #[test]
    fn blank_smtp_password_counts_as_unset() {
        let config = from_pairs(&[
            ("API_KEYS", "k1"),
            ("SMTP_USERNAME", "bot@example.com"),
            ("SMTP_PASSWORD", ""),
        ])
        .unwrap();

        assert!(config.smtp_credentials().is_none());
    }
}
