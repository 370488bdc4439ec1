//! Application configuration management with security considerations.
//!
//! All values come from the environment and are loaded exactly once in `main`.
//! The resulting [`AppConfig`] is shared read-only (`Arc<AppConfig>`) with
//! every component that needs it; nothing re-reads the environment while
//! serving requests.
//!
//! # Security Notes
//! - Sensitive fields are clearly marked and are never logged, `Debug` redacts them
//! - Rotating a secret requires a restart

use crate::webhook::{
    registry::{FieldAlias, InvalidFieldAlias, parse_field_aliases},
    security::SignaturePolicy,
};
use derive_more::{Display, Error};
use envconfig::Envconfig;
use std::{collections::HashMap, fmt, time::Duration};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    /// A required variable is absent, empty or unparsable. Fatal at startup.
    MissingStartupConfig(#[error(not(source))] String),
    InvalidFieldAlias(InvalidFieldAlias),
}

/// Application configuration with security-aware field management.
#[derive(Envconfig, Clone)]
pub struct AppConfig {
    /// Environment name to deploy the app (NON-SENSITIVE)
    /// Values: "local", "dev", "staging", "prod"
    #[envconfig(default = "local")]
    pub env: String,

    /// Host address for web server binding (NON-SENSITIVE)
    #[envconfig(default = "0.0.0.0")]
    pub web_server_host: String,

    /// Port for web server binding (NON-SENSITIVE)
    #[envconfig(default = "3000")]
    pub port: u16,

    /// 🔒 SENSITIVE: token echoed by Meta during the subscription handshake
    pub meta_verify_token: String,

    /// 🔒 SENSITIVE: app secret keying the X-Hub-Signature-256 HMAC
    pub meta_app_secret: String,

    /// 🔒 SENSITIVE: Graph API access token, only for handlers that call back into Meta
    pub meta_access_token: String,

    /// Reject deliveries without a valid signature (NON-SENSITIVE)
    /// Only disable for local testing with hand-made payloads
    #[envconfig(default = "true")]
    pub require_signature: bool,

    /// Upper bound for a single handler invocation, in seconds (NON-SENSITIVE)
    #[envconfig(default = "10")]
    pub handler_timeout_secs: u64,

    /// Pending handler jobs before new ones are dropped (NON-SENSITIVE)
    #[envconfig(default = "1024")]
    pub dispatch_queue_capacity: usize,

    /// Field name corrections, e.g. "page:mentions=mention,instagram:mention=mentions"
    #[envconfig(default = "")]
    pub field_aliases: String,

    /// 🔒 SENSITIVE: Logfire write token, logs stay local without it
    pub logfire_token: Option<String>,
}

impl AppConfig {
    /// Loads and validates the configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::init_from_env()
            .map_err(|e| ConfigError::MissingStartupConfig(e.to_string()))?
            .validated()
    }

    /// Same as [`AppConfig::load`] with an explicit variable map.
    pub fn load_from(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::init_from_hashmap(vars)
            .map_err(|e| ConfigError::MissingStartupConfig(e.to_string()))?
            .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("META_VERIFY_TOKEN", &self.meta_verify_token),
            ("META_APP_SECRET", &self.meta_app_secret),
            ("META_ACCESS_TOKEN", &self.meta_access_token),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingStartupConfig(format!(
                    "{name} must not be empty"
                )));
            }
        }

        self.field_aliases()?;
        Ok(self)
    }

    pub fn signature_policy(&self) -> SignaturePolicy {
        SignaturePolicy::from_flag(self.require_signature)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs.max(1))
    }

    pub fn field_aliases(&self) -> Result<Vec<FieldAlias>, ConfigError> {
        parse_field_aliases(&self.field_aliases).map_err(ConfigError::InvalidFieldAlias)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const REDACTED: &str = "<redacted>";

        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("web_server_host", &self.web_server_host)
            .field("port", &self.port)
            .field("meta_verify_token", &REDACTED)
            .field("meta_app_secret", &REDACTED)
            .field("meta_access_token", &REDACTED)
            .field("require_signature", &self.require_signature)
            .field("handler_timeout_secs", &self.handler_timeout_secs)
            .field("dispatch_queue_capacity", &self.dispatch_queue_capacity)
            .field("field_aliases", &self.field_aliases)
            .field("logfire_token", &self.logfire_token.as_ref().map(|_| REDACTED))
            .finish()
    }
}
