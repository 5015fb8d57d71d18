//! Ordered fallback chain of wire strategies.
//!
//! Each strategy is one payload shape plus the transport that carries it.
//! The chain tries them in order, once each and under a timeout, and stops
//! at the first success. Failures are accumulated rather than discarded so
//! an exhausted chain can report every cause.

pub mod payload;
pub mod responses;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::control_plane::ControlPlane;
use crate::message::{ChatMessage, WireMessage};
use crate::transport::{ServingTransport, TransportError};

pub use payload::{PayloadShape, PayloadStrategy};
pub use responses::{DirectTargetResolver, ResponsesStrategy};

/// Inputs shared by every strategy of one query.
#[derive(Debug)]
pub struct QueryContext<'a> {
    pub endpoint: &'a str,
    /// History exactly as the session holds it.
    pub history: &'a [ChatMessage],
    /// Projected `{role, content}` list, built once per query.
    pub messages: &'a [WireMessage<'a>],
    pub max_tokens: u32,
}

/// One way of getting an answer out of an endpoint.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Identifier used in logs and error reports.
    fn name(&self) -> &str;

    /// Attempt the query once.
    async fn attempt(&self, ctx: &QueryContext<'_>) -> Result<ChatMessage, TransportError>;
}

/// A strategy that did not produce an answer.
#[derive(Debug)]
pub struct StrategyFailure {
    pub strategy: String,
    pub error: TransportError,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.error)
    }
}

/// Join failures as `name: cause, name: cause`.
pub fn join_failures(failures: &[StrategyFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// First successful answer, plus whatever failed before it.
#[derive(Debug)]
pub struct ChainAnswer {
    pub reply: ChatMessage,
    pub strategy: String,
    pub failures: Vec<StrategyFailure>,
}

/// Ordered list of strategies with a per-attempt timeout.
pub struct StrategyChain {
    strategies: Vec<Arc<dyn Strategy>>,
    timeout: Duration,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Arc<dyn Strategy>>, timeout: Duration) -> Self {
        Self {
            strategies,
            timeout,
        }
    }

    /// Traced payload, then minimal payload, then the direct responses client.
    pub fn standard(
        transport: Arc<dyn ServingTransport>,
        resolver: DirectTargetResolver,
        timeout: Duration,
    ) -> Self {
        Self::new(
            vec![
                Arc::new(PayloadStrategy::new(transport.clone(), PayloadShape::Traced)),
                Arc::new(PayloadStrategy::new(transport.clone(), PayloadShape::Minimal)),
                Arc::new(ResponsesStrategy::new(transport, resolver)),
            ],
            timeout,
        )
    }

    /// Convenience for wiring [`StrategyChain::standard`] from a control plane.
    pub fn standard_with(
        transport: Arc<dyn ServingTransport>,
        control_plane: Arc<dyn ControlPlane>,
        explicit_token: Option<String>,
        explicit_workspace_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        let resolver =
            DirectTargetResolver::new(control_plane, explicit_token, explicit_workspace_url);
        Self::standard(transport, resolver, timeout)
    }

    /// Upper bound on a single attempt.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    async fn attempt_one(
        &self,
        strategy: &dyn Strategy,
        ctx: &QueryContext<'_>,
    ) -> Result<ChatMessage, TransportError> {
        match tokio::time::timeout(self.timeout, strategy.attempt(ctx)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        }
    }

    /// Run strategies in order until one succeeds.
    ///
    /// Returns every failure when none does.
    pub async fn run(&self, ctx: &QueryContext<'_>) -> Result<ChainAnswer, Vec<StrategyFailure>> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let name = strategy.name().to_string();
            match self.attempt_one(strategy.as_ref(), ctx).await {
                Ok(reply) => {
                    debug!(strategy = %name, prior_failures = failures.len(), "strategy succeeded");
                    return Ok(ChainAnswer {
                        reply,
                        strategy: name,
                        failures,
                    });
                }
                Err(error) => {
                    warn!(strategy = %name, "strategy failed: {error}");
                    failures.push(StrategyFailure {
                        strategy: name,
                        error,
                    });
                }
            }
        }

        Err(failures)
    }

    /// Run every strategy regardless of earlier successes.
    pub async fn run_each(
        &self,
        ctx: &QueryContext<'_>,
    ) -> Vec<(String, Result<ChatMessage, TransportError>)> {
        let mut results = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let result = self.attempt_one(strategy.as_ref(), ctx).await;
            results.push((strategy.name().to_string(), result));
        }
        results
    }
}
