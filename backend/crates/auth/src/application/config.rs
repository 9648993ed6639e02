//! Application Configuration
//!
//! Configuration for the Auth application layer. Built once at startup and
//! shared read-only through `Arc<AuthConfig>`.

use std::env;
use std::time::Duration as StdDuration;

use chrono::Duration;
use thiserror::Error;

/// Shortest accepted token signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 32;

const SECRET_BASE64_PREFIX: &str = "base64:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Auth application configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC-SHA256 key for session tokens
    pub token_secret: Vec<u8>,
    /// Lifetime embedded in the token; hard cap on a session's life
    pub token_ttl: Duration,
    /// Initial session lifetime (1 hour)
    pub session_ttl: Duration,
    /// How far a refresh pushes the expiry from "now"
    pub session_refresh_extension: Duration,
    /// When false, at most one live session per account
    pub allow_multiple_sessions: bool,
    /// `verify_session` warns when less than this remains
    pub expiry_warning_window: Duration,
    /// Reset token validity window (30 minutes)
    pub reset_token_ttl: Duration,
    /// Random bytes per reset token
    pub reset_token_bytes: usize,
    /// Reset link is `{reset_link_base}/{token}`
    pub reset_link_base: String,
    /// Bound on every email / geolocation call
    pub outbound_timeout: StdDuration,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// Fixed one-time code accepted by the second-factor stub
    pub second_factor_code: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: Vec::new(),
            token_ttl: Duration::hours(24),
            session_ttl: Duration::hours(1),
            session_refresh_extension: Duration::hours(1),
            allow_multiple_sessions: false,
            expiry_warning_window: Duration::minutes(10),
            reset_token_ttl: Duration::minutes(30),
            reset_token_bytes: 32,
            reset_link_base: "http://localhost:40922/reset-password".to_string(),
            outbound_timeout: StdDuration::from_secs(3),
            password_pepper: None,
            second_factor_code: "123456".to_string(),
        }
    }
}

impl AuthConfig {
    /// Create config with a random token secret (for development and tests)
    pub fn with_random_secret() -> Self {
        Self {
            token_secret: platform::crypto::random_bytes(MIN_SECRET_LEN),
            ..Default::default()
        }
    }

    /// Create config for development
    pub fn development() -> Self {
        Self::with_random_secret()
    }

    /// Load from environment variables
    ///
    /// | Env Var                        | Required | Default |
    /// |--------------------------------|----------|---------|
    /// | `AUTH_TOKEN_SECRET`            | yes      | -       |
    /// | `AUTH_SESSION_TTL_SECS`        | no       | `3600`  |
    /// | `AUTH_ALLOW_MULTIPLE_SESSIONS` | no       | `false` |
    /// | `AUTH_RESET_LINK_BASE`         | no       | local frontend |
    /// | `AUTH_PASSWORD_PEPPER`         | no       | none    |
    /// | `AUTH_SECOND_FACTOR_CODE`      | no       | `123456` |
    ///
    /// The secret is taken as raw bytes unless prefixed with `base64:`;
    /// either way it must come to at least 32 bytes.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret_raw =
            env::var("AUTH_TOKEN_SECRET").map_err(|_| ConfigError::Missing("AUTH_TOKEN_SECRET"))?;

        let mut config = Self {
            token_secret: parse_secret(&secret_raw)?,
            ..Default::default()
        };

        if let Ok(secs) = env::var("AUTH_SESSION_TTL_SECS") {
            let secs: i64 = secs.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "AUTH_SESSION_TTL_SECS",
                reason: format!("not an integer: {secs}"),
            })?;
            config.session_ttl = Duration::seconds(secs);
        }

        if let Ok(flag) = env::var("AUTH_ALLOW_MULTIPLE_SESSIONS") {
            config.allow_multiple_sessions = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(ConfigError::Invalid {
                        name: "AUTH_ALLOW_MULTIPLE_SESSIONS",
                        reason: format!("expected a boolean, got {other}"),
                    });
                }
            };
        }

        if let Ok(base) = env::var("AUTH_RESET_LINK_BASE") {
            config.reset_link_base = base.trim().trim_end_matches('/').to_string();
        }

        if let Ok(pepper) = env::var("AUTH_PASSWORD_PEPPER") {
            if !pepper.is_empty() {
                config.password_pepper = Some(pepper.into_bytes());
            }
        }

        if let Ok(code) = env::var("AUTH_SECOND_FACTOR_CODE") {
            config.second_factor_code = code.trim().to_string();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would break session invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "token_secret",
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }
        if self.session_ttl <= Duration::zero() {
            return Err(ConfigError::Invalid {
                name: "session_ttl",
                reason: "must be positive".to_string(),
            });
        }
        if self.token_ttl < self.session_ttl {
            return Err(ConfigError::Invalid {
                name: "token_ttl",
                reason: "must not be shorter than session_ttl".to_string(),
            });
        }
        if self.reset_token_bytes < 16 {
            return Err(ConfigError::Invalid {
                name: "reset_token_bytes",
                reason: "must be at least 16".to_string(),
            });
        }
        if self.second_factor_code.is_empty() {
            return Err(ConfigError::Invalid {
                name: "second_factor_code",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/{}", self.reset_link_base.trim_end_matches('/'), token)
    }
}

/// Raw bytes, or standard base64 after a `base64:` prefix
fn parse_secret(value: &str) -> Result<Vec<u8>, ConfigError> {
    let value = value.trim();
    match value.strip_prefix(SECRET_BASE64_PREFIX) {
        Some(encoded) => {
            platform::crypto::from_base64(encoded).map_err(|e| ConfigError::Invalid {
                name: "AUTH_TOKEN_SECRET",
                reason: format!("bad base64: {e}"),
            })
        }
        None => Ok(value.as_bytes().to_vec()),
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("session_ttl", &self.session_ttl)
            .field("allow_multiple_sessions", &self.allow_multiple_sessions)
            .field("reset_token_ttl", &self.reset_token_ttl)
            .field("reset_link_base", &self.reset_link_base)
            .field("outbound_timeout", &self.outbound_timeout)
            .finish_non_exhaustive()
    }
}
