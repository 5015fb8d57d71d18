//! Serving-endpoint transports.
//!
//! Two mechanisms reach an endpoint: the deployment client, which posts a
//! JSON payload to the endpoint's invocations URL, and the direct responses
//! client, which speaks the OpenAI-style `responses` protocol against the
//! workspace's serving base address.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::control_plane::{ControlPlane, ControlPlaneError, join_segments};

/// Failure of a single transport attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response parse error: {0}")]
    Decode(String),

    #[error("unexpected response shape: {0}")]
    MalformedResponse(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("No authentication token available: {0}")]
    CredentialUnavailable(String),

    #[error("No workspace URL available: {0}")]
    AddressUnavailable(String),

    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
}

/// Bearer credential and base address for the direct responses client.
#[derive(Clone)]
pub struct DirectTarget {
    pub token: String,
    /// Base address ending in `/serving-endpoints`.
    pub base_url: String,
}

impl std::fmt::Debug for DirectTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectTarget")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Network access to serving endpoints.
#[async_trait]
pub trait ServingTransport: Send + Sync {
    /// Submit `inputs` verbatim to the endpoint and return the decoded body.
    async fn predict(&self, endpoint: &str, inputs: &Value) -> Result<Value, TransportError>;

    /// Call `responses.create` and return `output[0].content[0].text`.
    async fn create_response(
        &self,
        target: &DirectTarget,
        model: &str,
        input: &Value,
    ) -> Result<String, TransportError>;
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a Value,
}

#[derive(Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output: Vec<ResponsesOutputItem>,
}

#[derive(Deserialize)]
struct ResponsesOutputItem {
    #[serde(default)]
    content: Vec<ResponsesContentItem>,
}

#[derive(Deserialize)]
struct ResponsesContentItem {
    text: Option<String>,
}

/// reqwest-backed transport authenticating through the control plane.
pub struct HttpServingTransport {
    client: Client,
    control_plane: Arc<dyn ControlPlane>,
}

impl HttpServingTransport {
    pub fn new(client: Client, control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            client,
            control_plane,
        }
    }
}

async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(TransportError::Status { status, body })
}

#[async_trait]
impl ServingTransport for HttpServingTransport {
    async fn predict(&self, endpoint: &str, inputs: &Value) -> Result<Value, TransportError> {
        let host = self.control_plane.host().ok_or_else(|| {
            ControlPlaneError::NotConfigured("DATABRICKS_HOST is not set".into())
        })?;
        let token = self.control_plane.token().await?;
        let url = join_segments(&host, &["serving-endpoints", endpoint, "invocations"])?;
        debug!(%url, "posting invocation payload");

        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(inputs)
            .send()
            .await?;
        let resp = error_for_status(resp).await?;

        resp.json::<Value>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn create_response(
        &self,
        target: &DirectTarget,
        model: &str,
        input: &Value,
    ) -> Result<String, TransportError> {
        let url = join_segments(&target.base_url, &["responses"])?;
        debug!(%url, model, "creating response");

        let resp = self
            .client
            .post(url)
            .bearer_auth(&target.token)
            .json(&ResponsesRequest { model, input })
            .send()
            .await?;
        let resp = error_for_status(resp).await?;

        let body: ResponsesBody = resp
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        body.output
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::MalformedResponse("output is empty".into()))?
            .content
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::MalformedResponse("output[0].content is empty".into()))?
            .text
            .ok_or_else(|| {
                TransportError::MalformedResponse("output[0].content[0] has no text".into())
            })
    }
}
