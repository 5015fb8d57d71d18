//! Workspace control-plane client.
//!
//! Describes serving endpoints and hands out the workspace host and bearer
//! credential used by the direct responses client when no explicit values
//! are configured.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::config::WorkspaceSettings;

/// Control-plane errors.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("Control plane not configured: {0}")]
    NotConfigured(String),

    #[error("Endpoint not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Control plane returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Control plane request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Control plane response parse error: {0}")]
    Decode(String),

    #[error("Invalid workspace URL: {0}")]
    InvalidUrl(String),
}

/// Readiness reported alongside an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct EndpointState {
    #[serde(default)]
    pub ready: Option<String>,
    #[serde(default)]
    pub config_update: Option<String>,
}

/// Metadata about a serving endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointDescriptor {
    pub name: String,
    #[serde(rename = "task", default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub state: Option<EndpointState>,
}

/// Read access to the workspace control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Fetch the descriptor of a serving endpoint. Never cached.
    async fn get_endpoint(&self, name: &str) -> Result<EndpointDescriptor, ControlPlaneError>;

    /// Bearer credential the control plane itself authenticates with.
    async fn token(&self) -> Result<String, ControlPlaneError>;

    /// Workspace host, normalized to `scheme://host` without a trailing slash.
    fn host(&self) -> Option<String>;
}

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);

/// A cached token is refreshed this long before it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("refresh_at", &self.refresh_at)
            .finish_non_exhaustive()
    }
}

/// HTTP control-plane client.
///
/// Authenticates with a personal access token when one is configured and
/// otherwise exchanges service principal credentials for a short-lived
/// token, reused until shortly before it expires. Clones share the cache.
#[derive(Clone, Debug)]
pub struct WorkspaceClient {
    client: Client,
    settings: WorkspaceSettings,
    oauth: Arc<Mutex<Option<CachedToken>>>,
}

impl WorkspaceClient {
    pub fn new(client: Client, settings: WorkspaceSettings) -> Self {
        Self {
            client,
            settings,
            oauth: Arc::new(Mutex::new(None)),
        }
    }

    fn require_host(&self) -> Result<String, ControlPlaneError> {
        self.host()
            .ok_or_else(|| ControlPlaneError::NotConfigured("DATABRICKS_HOST is not set".into()))
    }

    /// The cached service principal token, exchanging a new one when the
    /// cache is empty or close to expiry. Concurrent callers wait on one
    /// exchange.
    async fn service_principal_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<String, ControlPlaneError> {
        let mut cached = self.oauth.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.value.clone());
        }

        let host = self.require_host()?;
        let fresh = self
            .exchange_client_credentials(&host, client_id, client_secret)
            .await?;
        let value = fresh.access_token.clone();
        let lifetime = fresh
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        *cached = Some(CachedToken {
            value: fresh.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        Ok(value)
    }

    async fn exchange_client_credentials(
        &self,
        host: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<OAuthTokenResponse, ControlPlaneError> {
        let url = join_segments(host, &["oidc", "v1", "token"])?;
        debug!(%url, "requesting service principal token");

        let resp = self
            .client
            .post(url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", "all-apis")])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ControlPlaneError::Http { status, body });
        }

        resp.json()
            .await
            .map_err(|e| ControlPlaneError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ControlPlane for WorkspaceClient {
    async fn get_endpoint(&self, name: &str) -> Result<EndpointDescriptor, ControlPlaneError> {
        let host = self.require_host()?;
        let token = self.token().await?;
        let url = join_segments(&host, &["api", "2.0", "serving-endpoints", name])?;

        let resp = self.client.get(url).bearer_auth(token).send().await?;

        match resp.status() {
            s if s.is_success() => resp
                .json::<EndpointDescriptor>()
                .await
                .map_err(|e| ControlPlaneError::Decode(e.to_string())),
            StatusCode::NOT_FOUND => Err(ControlPlaneError::NotFound(name.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ControlPlaneError::PermissionDenied(name.to_string()))
            }
            s => {
                let body = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| "<no body>".to_string());
                Err(ControlPlaneError::Http {
                    status: s.as_u16(),
                    body,
                })
            }
        }
    }

    async fn token(&self) -> Result<String, ControlPlaneError> {
        if let Some(token) = &self.settings.token {
            return Ok(token.clone());
        }

        match (&self.settings.client_id, &self.settings.client_secret) {
            (Some(id), Some(secret)) => self.service_principal_token(id, secret).await,
            _ => Err(ControlPlaneError::NotConfigured(
                "no authentication token available".into(),
            )),
        }
    }

    fn host(&self) -> Option<String> {
        self.settings.host.as_deref().map(normalize_host)
    }
}

/// Add a scheme when missing and strip trailing slashes.
pub fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Append percent-encoded path segments to a base URL.
pub(crate) fn join_segments(base: &str, segments: &[&str]) -> Result<Url, ControlPlaneError> {
    let mut url = Url::parse(base).map_err(|e| ControlPlaneError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ControlPlaneError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
