//! Direct responses-client strategy.
//!
//! Sends the history exactly as the session holds it, not the projected
//! list, matching the format observed to work against live endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{QueryContext, Strategy};
use crate::control_plane::{ControlPlane, normalize_host};
use crate::message::ChatMessage;
use crate::transport::{DirectTarget, ServingTransport, TransportError};

/// Resolves the bearer credential and base address for the responses client.
///
/// Explicit configuration wins; the control plane fills in whatever is unset.
#[derive(Clone)]
pub struct DirectTargetResolver {
    control_plane: Arc<dyn ControlPlane>,
    explicit_token: Option<String>,
    explicit_workspace_url: Option<String>,
}

impl DirectTargetResolver {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        explicit_token: Option<String>,
        explicit_workspace_url: Option<String>,
    ) -> Self {
        Self {
            control_plane,
            explicit_token,
            explicit_workspace_url,
        }
    }

    pub async fn resolve(&self) -> Result<DirectTarget, TransportError> {
        let token = match &self.explicit_token {
            Some(token) => token.clone(),
            None => self
                .control_plane
                .token()
                .await
                .map_err(|e| TransportError::CredentialUnavailable(e.to_string()))?,
        };

        let workspace_url = match &self.explicit_workspace_url {
            Some(url) => url.clone(),
            None => self.control_plane.host().ok_or_else(|| {
                TransportError::AddressUnavailable("workspace host is not configured".into())
            })?,
        };

        Ok(DirectTarget {
            token,
            base_url: format!("{}/serving-endpoints", normalize_host(&workspace_url)),
        })
    }
}

/// `responses.create(model = endpoint, input = history)`.
pub struct ResponsesStrategy {
    transport: Arc<dyn ServingTransport>,
    resolver: DirectTargetResolver,
}

impl ResponsesStrategy {
    pub fn new(transport: Arc<dyn ServingTransport>, resolver: DirectTargetResolver) -> Self {
        Self {
            transport,
            resolver,
        }
    }
}

#[async_trait]
impl Strategy for ResponsesStrategy {
    fn name(&self) -> &str {
        "responses_api"
    }

    async fn attempt(&self, ctx: &QueryContext<'_>) -> Result<ChatMessage, TransportError> {
        let target = self.resolver.resolve().await?;
        debug!(base_url = %target.base_url, "resolved direct client target");

        let input = serde_json::to_value(ctx.history)
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        let text = self
            .transport
            .create_response(&target, ctx.endpoint, &input)
            .await?;
        Ok(ChatMessage::assistant(text))
    }
}
