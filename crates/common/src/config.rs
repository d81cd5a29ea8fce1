//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Prefix of environment variables overriding file settings.
const ENV_PREFIX: &str = "APOLLUSIA";

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Outgoing mail. Mail notifications are disabled when absent.
    #[serde(default)]
    pub mail: Option<MailConfig>,
    /// Web Push. Push notifications are disabled when absent.
    #[serde(default)]
    pub push: Option<PushConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of the frontend. Used to build links in notifications.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// SMTP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// SMTP host.
    pub host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// SMTP username.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// Sender address, e.g. `Apollusia <noreply@apollusia.com>`.
    pub from: String,
    /// Use STARTTLS instead of implicit TLS.
    #[serde(default = "default_true")]
    pub starttls: bool,
}

/// Web Push (VAPID) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// URL-safe base64 encoded VAPID private key.
    pub private_key: String,
    /// VAPID subject, a `mailto:` or `https:` URL.
    pub subject: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_smtp_port() -> u16 {
    587
}

const fn default_true() -> bool {
    true
}

impl ServerConfig {
    /// Public origin without a trailing slash.
    #[must_use]
    pub fn origin(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `APOLLUSIA_ENV`)
    /// 3. Environment variables with `APOLLUSIA__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("APOLLUSIA_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_and_optional_sections() {
        let config = parse(
            r#"
            [server]
            url = "https://apollusia.com/"

            [database]
            url = "postgres://localhost/apollusia"
            "#,
        );

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.origin(), "https://apollusia.com");
        assert_eq!(config.database.max_connections, 20);
        assert!(config.mail.is_none());
        assert!(config.push.is_none());
    }

    #[test]
    fn test_mail_section() {
        let config = parse(
            r#"
            [server]
            url = "https://apollusia.com"

            [database]
            url = "postgres://localhost/apollusia"

            [mail]
            host = "smtp.example.com"
            from = "Apollusia <noreply@apollusia.com>"
            "#,
        );

        let mail = config.mail.unwrap();
        assert_eq!(mail.port, 587);
        assert!(mail.starttls);
        assert!(mail.username.is_none());
    }
}
