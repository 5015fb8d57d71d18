//! API server configuration.

use std::time::Duration;

use askdesk_core::config::{ChatConfig, ConfigError};

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

/// How long a session may sit unused before it is evicted.
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8000").
    pub bind_addr: String,
    /// Endpoint and credential settings for the chat adapter.
    pub chat: ChatConfig,
    /// Idle time after which a browser session is dropped.
    pub session_idle_timeout: Duration,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                    | Default          |
    /// |-----------------------------|------------------|
    /// | `BIND_ADDR`                 | `127.0.0.1:8000` |
    /// | `ASKDESK_SESSION_IDLE_SECS` | `3600`           |
    ///
    /// plus everything [`ChatConfig::from_env`] reads.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ApiConfig::from_env`] but reading through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.into());

        let session_idle_timeout = match lookup("ASKDESK_SESSION_IDLE_SECS")
            .filter(|v| !v.trim().is_empty())
        {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "ASKDESK_SESSION_IDLE_SECS",
                        value: raw,
                    });
                }
            },
            None => DEFAULT_SESSION_IDLE_TIMEOUT,
        };

        Ok(Self {
            bind_addr,
            chat: ChatConfig::from_lookup(&lookup)?,
            session_idle_timeout,
        })
    }
}
