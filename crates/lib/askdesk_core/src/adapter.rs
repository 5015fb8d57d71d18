//! Endpoint adapter.
//!
//! Re-checks endpoint support, projects the history once and runs the
//! strategy chain. Individual strategy failures never leave this module on
//! their own; they surface together once the chain is exhausted.

use std::sync::Arc;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};

use crate::capability::is_supported;
use crate::config::ChatConfig;
use crate::control_plane::{ControlPlane, WorkspaceClient};
use crate::message::{ChatMessage, project};
use crate::strategy::{QueryContext, StrategyChain, StrategyFailure, join_failures};
use crate::transport::HttpServingTransport;

/// Adapter errors.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(
        "Detected unsupported endpoint type for '{0}'. This client only supports \
         chat completions-compatible and agent endpoints."
    )]
    UnsupportedEndpointType(String),

    #[error("All approaches failed. {}", join_failures(.0))]
    AllTransportsExhausted(Vec<StrategyFailure>),
}

/// Replies of a successful query and the strategies that failed first.
#[derive(Debug)]
pub struct QueryReport {
    pub replies: Vec<ChatMessage>,
    pub strategy: String,
    pub failures: Vec<StrategyFailure>,
}

impl QueryReport {
    /// Causes of the strategies that failed before the one that answered.
    pub fn combined_error(&self) -> Option<String> {
        (!self.failures.is_empty()).then(|| join_failures(&self.failures))
    }
}

/// Queries a serving endpoint through the strategy chain.
pub struct EndpointAdapter {
    control_plane: Arc<dyn ControlPlane>,
    chain: StrategyChain,
}

impl EndpointAdapter {
    pub fn new(control_plane: Arc<dyn ControlPlane>, chain: StrategyChain) -> Self {
        Self {
            control_plane,
            chain,
        }
    }

    /// Wire the HTTP clients and the standard chain from config.
    pub fn from_config(config: &ChatConfig, client: Client) -> Self {
        let control_plane: Arc<dyn ControlPlane> =
            Arc::new(WorkspaceClient::new(client.clone(), config.workspace.clone()));
        let transport = Arc::new(HttpServingTransport::new(client, control_plane.clone()));
        let chain = StrategyChain::standard_with(
            transport,
            control_plane.clone(),
            config.explicit_token.clone(),
            config.explicit_workspace_url.clone(),
            config.strategy_timeout,
        );
        Self::new(control_plane, chain)
    }

    pub fn control_plane(&self) -> &dyn ControlPlane {
        self.control_plane.as_ref()
    }

    pub fn chain(&self) -> &StrategyChain {
        &self.chain
    }

    /// Fail-open capability check, bounded by the per-strategy timeout.
    pub async fn endpoint_supported(&self, endpoint_name: &str) -> bool {
        is_supported(self.control_plane.as_ref(), endpoint_name, self.chain.timeout()).await
    }

    /// Query and keep the per-strategy failure detail.
    pub async fn query_with_report(
        &self,
        endpoint_name: &str,
        history: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<QueryReport, AdapterError> {
        if endpoint_name.trim().is_empty() {
            return Err(AdapterError::InvalidRequest("endpoint name is empty".into()));
        }
        if history.is_empty() {
            return Err(AdapterError::InvalidRequest("history is empty".into()));
        }

        if !self.endpoint_supported(endpoint_name).await {
            return Err(AdapterError::UnsupportedEndpointType(endpoint_name.to_string()));
        }

        // None of the wire shapes carries max_tokens.
        debug!(endpoint = endpoint_name, max_tokens, turns = history.len(), "querying endpoint");

        let messages = project(history);
        let ctx = QueryContext {
            endpoint: endpoint_name,
            history,
            messages: &messages,
            max_tokens,
        };

        let answer = self
            .chain
            .run(&ctx)
            .await
            .map_err(AdapterError::AllTransportsExhausted)?;

        info!(
            endpoint = endpoint_name,
            strategy = %answer.strategy,
            fallbacks = answer.failures.len(),
            "endpoint answered"
        );

        Ok(QueryReport {
            replies: vec![answer.reply],
            strategy: answer.strategy,
            failures: answer.failures,
        })
    }

    /// Normalized replies for `history`. Currently always one message.
    pub async fn query(
        &self,
        endpoint_name: &str,
        history: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<Vec<ChatMessage>, AdapterError> {
        self.query_with_report(endpoint_name, history, max_tokens)
            .await
            .map(|report| report.replies)
    }

    /// The last reply of [`EndpointAdapter::query`].
    pub async fn query_endpoint(
        &self,
        endpoint_name: &str,
        history: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<ChatMessage, AdapterError> {
        self.query(endpoint_name, history, max_tokens)
            .await?
            .pop()
            .ok_or_else(|| AdapterError::AllTransportsExhausted(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::control_plane::{ControlPlaneError, EndpointDescriptor};
    use crate::transport::{DirectTarget, ServingTransport, TransportError};

    struct Plane {
        task: Option<&'static str>,
        lookups: AtomicU32,
    }

    impl Plane {
        fn with_task(task: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                task,
                lookups: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ControlPlane for Plane {
        async fn get_endpoint(&self, name: &str) -> Result<EndpointDescriptor, ControlPlaneError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(EndpointDescriptor {
                name: name.to_string(),
                task_type: self.task.map(str::to_string),
                state: None,
            })
        }

        async fn token(&self) -> Result<String, ControlPlaneError> {
            Ok("plane-token".into())
        }

        fn host(&self) -> Option<String> {
            Some("https://ws.example.com".into())
        }
    }

    /// Control plane that never answers.
    struct Hangs;

    #[async_trait]
    impl ControlPlane for Hangs {
        async fn get_endpoint(&self, _name: &str) -> Result<EndpointDescriptor, ControlPlaneError> {
            std::future::pending().await
        }

        async fn token(&self) -> Result<String, ControlPlaneError> {
            Ok("plane-token".into())
        }

        fn host(&self) -> Option<String> {
            Some("https://ws.example.com".into())
        }
    }

    /// Scripted transport: one predict result per call, in order.
    struct Scripted {
        predicts: Mutex<Vec<Result<Value, TransportError>>>,
        direct: Mutex<Option<Result<String, TransportError>>>,
        predict_calls: AtomicU32,
    }

    impl Scripted {
        fn new(
            predicts: Vec<Result<Value, TransportError>>,
            direct: Result<String, TransportError>,
        ) -> Arc<Self> {
            let mut predicts = predicts;
            predicts.reverse();
            Arc::new(Self {
                predicts: Mutex::new(predicts),
                direct: Mutex::new(Some(direct)),
                predict_calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ServingTransport for Scripted {
        async fn predict(&self, _endpoint: &str, _inputs: &Value) -> Result<Value, TransportError> {
            self.predict_calls.fetch_add(1, Ordering::SeqCst);
            self.predicts
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(TransportError::MalformedResponse("script ran out".into())))
        }

        async fn create_response(
            &self,
            _target: &DirectTarget,
            _model: &str,
            _input: &Value,
        ) -> Result<String, TransportError> {
            self.direct
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(TransportError::MalformedResponse("script ran out".into())))
        }
    }

    fn adapter(plane: Arc<Plane>, transport: Arc<Scripted>) -> EndpointAdapter {
        let chain = StrategyChain::standard_with(
            transport,
            plane.clone(),
            None,
            None,
            Duration::from_secs(5),
        );
        EndpointAdapter::new(plane, chain)
    }

    fn status(code: u16, body: &str) -> TransportError {
        TransportError::Status {
            status: code,
            body: body.to_string(),
        }
    }

    fn question() -> Vec<ChatMessage> {
        vec![ChatMessage::user("What is the remote work policy?")]
    }

    #[tokio::test]
    async fn traced_payload_success() {
        let transport = Scripted::new(
            vec![Ok(json!({"output": [{"content": [{"text": "Work from home 2 days/week."}]}]}))],
            Ok("unused".into()),
        );
        let adapter = adapter(Plane::with_task(Some("agent/v1/responses")), transport.clone());

        let reply = adapter.query_endpoint("kb", &question(), 512).await.unwrap();
        assert_eq!(reply, ChatMessage::assistant("Work from home 2 days/week."));
        assert_eq!(transport.predict_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn minimal_payload_after_traced_failure() {
        let transport = Scripted::new(
            vec![
                Err(status(400, "unknown field databricks_options")),
                Ok(json!({"predictions": ["Y"]})),
            ],
            Ok("unused".into()),
        );
        let adapter = adapter(Plane::with_task(Some("llm/v1/chat")), transport);

        let report = adapter.query_with_report("kb", &question(), 512).await.unwrap();
        assert_eq!(report.replies, vec![ChatMessage::assistant("Y")]);
        assert_eq!(report.strategy, "minimal_payload");

        let combined = report.combined_error().unwrap();
        assert!(combined.contains("traced_payload"));
        assert!(combined.contains("unknown field databricks_options"));
        assert!(!combined.contains("minimal_payload"));
        assert!(!combined.contains("All approaches failed"));
    }

    #[tokio::test]
    async fn responses_client_is_last_resort() {
        let transport = Scripted::new(
            vec![Err(status(400, "bad a")), Err(status(422, "bad b"))],
            Ok("direct".into()),
        );
        let adapter = adapter(Plane::with_task(Some("agent")), transport);

        let report = adapter.query_with_report("kb", &question(), 512).await.unwrap();
        assert_eq!(report.strategy, "responses_api");
        assert_eq!(report.replies[0].content, "direct");
        assert_eq!(report.failures.len(), 2);
    }

    #[tokio::test]
    async fn exhaustion_mentions_every_cause() {
        let transport = Scripted::new(
            vec![Err(status(400, "fragment-one")), Err(status(500, "fragment-two"))],
            Err(TransportError::MalformedResponse("fragment-three".into())),
        );
        let adapter = adapter(Plane::with_task(Some("agent/v2/chat")), transport);

        let err = adapter.query("kb", &question(), 512).await.unwrap_err();
        assert!(matches!(err, AdapterError::AllTransportsExhausted(ref f) if f.len() == 3));
        let msg = err.to_string();
        assert!(msg.starts_with("All approaches failed."));
        assert!(msg.contains("fragment-one"));
        assert!(msg.contains("fragment-two"));
        assert!(msg.contains("fragment-three"));
    }

    #[tokio::test]
    async fn unsupported_endpoint_skips_transports() {
        let transport = Scripted::new(vec![Ok(json!({"predictions": ["never"]}))], Ok("x".into()));
        let adapter = adapter(Plane::with_task(Some("llm/v1/embeddings")), transport.clone());

        let err = adapter.query("kb", &question(), 512).await.unwrap_err();
        assert!(matches!(err, AdapterError::UnsupportedEndpointType(_)));
        assert_eq!(transport.predict_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn support_is_rechecked_every_query() {
        let plane = Plane::with_task(Some("chat"));
        let transport = Scripted::new(
            vec![Ok(json!({"predictions": ["1"]})), Ok(json!({"predictions": ["2"]}))],
            Ok("x".into()),
        );
        let adapter = adapter(plane.clone(), transport);

        adapter.query("kb", &question(), 512).await.unwrap();
        adapter.query("kb", &question(), 512).await.unwrap();
        assert_eq!(plane.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected_up_front() {
        let plane = Plane::with_task(Some("chat"));
        let adapter = adapter(plane.clone(), Scripted::new(vec![], Ok("x".into())));

        let err = adapter.query("kb", &[], 512).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidRequest(_)));
        let err = adapter.query(" ", &question(), 512).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidRequest(_)));
        assert_eq!(plane.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_control_plane_does_not_stall_the_query() {
        let plane = Arc::new(Hangs);
        let transport = Scripted::new(
            vec![Ok(json!({"predictions": ["still answered"]}))],
            Ok("unused".into()),
        );
        let chain = StrategyChain::standard_with(
            transport,
            plane.clone(),
            None,
            None,
            Duration::from_secs(2),
        );
        let adapter = EndpointAdapter::new(plane, chain);

        let reply = tokio::time::timeout(
            Duration::from_secs(24 * 60 * 60),
            adapter.query_endpoint("kb", &question(), 512),
        )
        .await
        .expect("query finishes once the lookup times out")
        .unwrap();
        assert_eq!(reply, ChatMessage::assistant("still answered"));
    }
}
