//! Structured payload strategies over the deployment transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{QueryContext, Strategy};
use crate::message::{ChatMessage, WireMessage};
use crate::normalize::normalize;
use crate::transport::{ServingTransport, TransportError};

/// Which structured payload to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// `{ "input": [...], "databricks_options": { "return_trace": true } }`
    Traced,
    /// `{ "input": [...] }`
    Minimal,
}

#[derive(Serialize)]
struct TraceOptions {
    return_trace: bool,
}

#[derive(Serialize)]
struct InvocationPayload<'a> {
    input: &'a [WireMessage<'a>],
    #[serde(rename = "databricks_options", skip_serializing_if = "Option::is_none")]
    options: Option<TraceOptions>,
}

impl PayloadShape {
    /// Build the wire payload for `messages`.
    pub fn build(self, messages: &[WireMessage<'_>]) -> Value {
        let options = match self {
            PayloadShape::Traced => Some(TraceOptions { return_trace: true }),
            PayloadShape::Minimal => None,
        };
        // Serializing borrowed strings into a Value cannot fail.
        serde_json::to_value(InvocationPayload {
            input: messages,
            options,
        })
        .unwrap_or(Value::Null)
    }
}

/// Posts a structured payload and normalizes whatever comes back.
pub struct PayloadStrategy {
    transport: Arc<dyn ServingTransport>,
    shape: PayloadShape,
}

impl PayloadStrategy {
    pub fn new(transport: Arc<dyn ServingTransport>, shape: PayloadShape) -> Self {
        Self { transport, shape }
    }
}

#[async_trait]
impl Strategy for PayloadStrategy {
    fn name(&self) -> &str {
        match self.shape {
            PayloadShape::Traced => "traced_payload",
            PayloadShape::Minimal => "minimal_payload",
        }
    }

    async fn attempt(&self, ctx: &QueryContext<'_>) -> Result<ChatMessage, TransportError> {
        let payload = self.shape.build(ctx.messages);
        let raw = self.transport.predict(ctx.endpoint, &payload).await?;
        debug!(
            strategy = self.name(),
            rule = crate::normalize::matching_rule(&raw).unwrap_or("stringify"),
            "normalizing response"
        );
        Ok(ChatMessage::assistant(normalize(&raw)))
    }
}
