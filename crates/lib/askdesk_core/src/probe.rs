//! Endpoint connectivity probe.
//!
//! Runs every strategy independently against a single test question and
//! reports which ones work, along with what the control plane says about
//! the endpoint. Used by operators to find out which wire format a
//! deployment accepts.

use serde::Serialize;

use crate::adapter::EndpointAdapter;
use crate::capability::task_type_supported;
use crate::message::{ChatMessage, project};
use crate::strategy::QueryContext;

/// Question used when the caller does not supply one.
pub const DEFAULT_PROBE_QUESTION: &str = "What is our company policy on remote work?";

/// What the control plane reported, or why it could not.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointInfo {
    pub task_type: Option<String>,
    pub ready: Option<String>,
    pub supported: bool,
}

/// Outcome of one strategy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeAttempt {
    pub strategy: String,
    pub success: bool,
    /// Normalized answer on success, failure text otherwise.
    pub detail: String,
}

/// Full probe result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub endpoint: String,
    pub question: String,
    pub info: Result<EndpointInfo, String>,
    pub attempts: Vec<ProbeAttempt>,
}

impl ProbeReport {
    /// First strategy that answered.
    pub fn working_strategy(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| a.success)
            .map(|a| a.strategy.as_str())
    }
}

/// Probe `endpoint` with `question` using every strategy of `adapter`.
pub async fn probe(adapter: &EndpointAdapter, endpoint: &str, question: &str) -> ProbeReport {
    let limit = adapter.chain().timeout();
    let info = match tokio::time::timeout(limit, adapter.control_plane().get_endpoint(endpoint)).await
    {
        Ok(lookup) => lookup
            .map(|ep| EndpointInfo {
                supported: task_type_supported(ep.task_type.as_deref()),
                task_type: ep.task_type,
                ready: ep.state.and_then(|s| s.ready),
            })
            .map_err(|e| e.to_string()),
        Err(_) => Err(format!("endpoint lookup timed out after {limit:?}")),
    };

    let history = vec![ChatMessage::user(question)];
    let messages = project(&history);
    let ctx = QueryContext {
        endpoint,
        history: &history,
        messages: &messages,
        max_tokens: crate::config::DEFAULT_MAX_TOKENS,
    };

    let attempts = adapter
        .chain()
        .run_each(&ctx)
        .await
        .into_iter()
        .map(|(strategy, result)| match result {
            Ok(reply) => ProbeAttempt {
                strategy,
                success: true,
                detail: reply.content,
            },
            Err(e) => ProbeAttempt {
                strategy,
                success: false,
                detail: e.to_string(),
            },
        })
        .collect();

    ProbeReport {
        endpoint: endpoint.to_string(),
        question: question.to_string(),
        info,
        attempts,
    }
}
