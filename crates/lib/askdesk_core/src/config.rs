//! Chat configuration.
//!
//! Resolved once at process start and threaded through the adapter and the
//! API state. There is no process-wide endpoint singleton.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default advisory token limit passed to the adapter.
pub const DEFAULT_MAX_TOKENS: u32 = 512;

/// Default per-strategy timeout.
pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Unable to determine serving endpoint to use for the chat app. If developing locally, \
         set the SERVING_ENDPOINT environment variable to the name of your serving endpoint. \
         If deploying as an app, include a serving endpoint resource named 'serving_endpoint' \
         with CAN_QUERY permissions."
    )]
    MissingEndpoint,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Settings for reaching the workspace control plane and its serving endpoints.
#[derive(Clone, Debug, Default)]
pub struct WorkspaceSettings {
    /// Workspace host used by the control-plane and deployment clients.
    pub host: Option<String>,
    /// Personal access token.
    pub token: Option<String>,
    /// Service principal client id (OAuth client credentials).
    pub client_id: Option<String>,
    /// Service principal client secret.
    pub client_secret: Option<String>,
}

/// Configuration for the chat adapter and session controller.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Name of the serving endpoint every query goes to.
    pub endpoint_name: String,
    /// Explicit bearer credential for the direct responses client.
    pub explicit_token: Option<String>,
    /// Explicit base address for the direct responses client.
    pub explicit_workspace_url: Option<String>,
    /// Control-plane connection settings.
    pub workspace: WorkspaceSettings,
    /// Advisory; not every wire shape carries it.
    pub max_tokens: u32,
    /// Upper bound on a single strategy attempt.
    pub strategy_timeout: Duration,
}

impl ChatConfig {
    /// Minimal configuration for an endpoint, with every optional setting unset.
    pub fn new(endpoint_name: impl Into<String>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            explicit_token: None,
            explicit_workspace_url: None,
            workspace: WorkspaceSettings::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            strategy_timeout: DEFAULT_STRATEGY_TIMEOUT,
        }
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable                        | Default      |
    /// |---------------------------------|--------------|
    /// | `SERVING_ENDPOINT`              | **required** |
    /// | `DATABRICKS_TOKEN`              | unset        |
    /// | `DATABRICKS_WORKSPACE_URL`      | unset        |
    /// | `DATABRICKS_HOST`               | unset        |
    /// | `DATABRICKS_CLIENT_ID`          | unset        |
    /// | `DATABRICKS_CLIENT_SECRET`      | unset        |
    /// | `ASKDESK_MAX_TOKENS`            | `512`        |
    /// | `ASKDESK_STRATEGY_TIMEOUT_SECS` | `120`        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`ChatConfig::from_env`] but reading through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let endpoint_name = get("SERVING_ENDPOINT").ok_or(ConfigError::MissingEndpoint)?;

        let max_tokens = match get("ASKDESK_MAX_TOKENS") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "ASKDESK_MAX_TOKENS",
                value: raw,
            })?,
            None => DEFAULT_MAX_TOKENS,
        };

        let strategy_timeout = match get("ASKDESK_STRATEGY_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "ASKDESK_STRATEGY_TIMEOUT_SECS",
                        value: raw,
                    });
                }
            },
            None => DEFAULT_STRATEGY_TIMEOUT,
        };

        let token = get("DATABRICKS_TOKEN");

        Ok(Self {
            endpoint_name,
            explicit_token: token.clone(),
            explicit_workspace_url: get("DATABRICKS_WORKSPACE_URL"),
            workspace: WorkspaceSettings {
                host: get("DATABRICKS_HOST"),
                token,
                client_id: get("DATABRICKS_CLIENT_ID"),
                client_secret: get("DATABRICKS_CLIENT_SECRET"),
            },
            max_tokens,
            strategy_timeout,
        })
    }
}
