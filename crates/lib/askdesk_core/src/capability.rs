//! Endpoint capability check.
//!
//! Classifies the task type a serving endpoint declares. When the descriptor
//! cannot be fetched the check fails open so the adapter still gets to try
//! and report a more specific error.

use std::time::Duration;

use tracing::{debug, warn};

use crate::control_plane::ControlPlane;

/// Task types this client knows how to talk to.
pub const SUPPORTED_TASK_TYPES: &[&str] = &[
    "agent/v1/chat",
    "agent/v2/chat",
    "llm/v1/chat",
    "AGENT_TASK",
    "agent",
    "chat",
];

/// Classify a declared task type. An absent task type is unsupported.
pub fn task_type_supported(task_type: Option<&str>) -> bool {
    let task = task_type.unwrap_or_default();
    let lower = task.to_lowercase();
    SUPPORTED_TASK_TYPES.contains(&task) || lower.contains("agent") || lower.contains("chat")
}

/// Whether `endpoint_name` declares a supported task type.
///
/// Returns `true` when the control plane cannot be reached, refuses the
/// lookup, or does not answer within `limit`.
pub async fn is_supported(
    control_plane: &dyn ControlPlane,
    endpoint_name: &str,
    limit: Duration,
) -> bool {
    match tokio::time::timeout(limit, control_plane.get_endpoint(endpoint_name)).await {
        Ok(Ok(descriptor)) => {
            let supported = task_type_supported(descriptor.task_type.as_deref());
            debug!(
                endpoint = endpoint_name,
                task_type = descriptor.task_type.as_deref().unwrap_or(""),
                supported,
                "classified endpoint task type"
            );
            supported
        }
        Ok(Err(e)) => {
            warn!(endpoint = endpoint_name, "could not determine endpoint task type: {e}");
            true
        }
        Err(_) => {
            warn!(
                endpoint = endpoint_name,
                "could not determine endpoint task type: lookup timed out after {limit:?}"
            );
            true
        }
    }
}
