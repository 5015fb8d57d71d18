//! Chat session controller.
//!
//! Owns the conversation history of one browser session and drives one
//! adapter call per submitted prompt. Every turn, answered or not, appends
//! exactly one user entry followed by exactly one assistant entry.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::adapter::EndpointAdapter;
use crate::config::ChatConfig;
use crate::message::ChatMessage;

/// Assistant text recorded when a turn fails.
pub const APOLOGY: &str = "I apologize for the technical issue. Please try rephrasing your \
                           question or try one of the example questions above.";

/// Length of the technical detail excerpt shown for exhausted strategies.
const DETAIL_EXCERPT_CHARS: usize = 200;

/// A titled group of example questions.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub questions: &'static [&'static str],
}

/// Example questions offered on an empty conversation.
pub const EXAMPLE_GROUPS: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Policy Examples",
        questions: &[
            "What is the remote work policy?",
            "How do I request time off?",
            "What are the employee benefits?",
            "Where can I find the employee handbook?",
        ],
    },
    ExampleGroup {
        title: "General Examples",
        questions: &[
            "How do I onboard a new employee?",
            "What are the security guidelines?",
            "Who do I contact for IT support?",
            "What is the expense reimbursement process?",
        ],
    },
];

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Prompt is empty")]
    EmptyPrompt,
}

/// Where a session is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    AwaitingInput,
    Processing,
    Displaying,
}

/// User-facing notice chosen from the text of an adapter failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FailureNotice {
    Authentication,
    Validation,
    MultipleAttemptsFailed { details: String },
    TechnicalDifficulty,
}

impl FailureNotice {
    /// Case-insensitive keyword classification, first match wins.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("authentication") || lower.contains("token") {
            FailureNotice::Authentication
        } else if lower.contains("validation") || lower.contains("schema") {
            FailureNotice::Validation
        } else if lower.contains("failed") && lower.contains("approaches") {
            FailureNotice::MultipleAttemptsFailed {
                details: message.chars().take(DETAIL_EXCERPT_CHARS).collect(),
            }
        } else {
            FailureNotice::TechnicalDifficulty
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            FailureNotice::Authentication => "Authentication issue with the knowledge base.",
            FailureNotice::Validation => "Data format issue when querying the knowledge base.",
            FailureNotice::MultipleAttemptsFailed { .. } => {
                "Multiple connection attempts to the knowledge base failed."
            }
            FailureNotice::TechnicalDifficulty => {
                "I'm experiencing technical difficulties connecting to the knowledge base."
            }
        }
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            FailureNotice::Authentication => {
                "Please contact your administrator to check endpoint permissions."
            }
            FailureNotice::Validation => {
                "Try asking your question in a different way, such as 'Explain the remote \
                 work policy' or 'What is the process for expense reimbursement?'"
            }
            FailureNotice::MultipleAttemptsFailed { .. } => {
                "Please try again in a moment, or contact support if the issue persists."
            }
            FailureNotice::TechnicalDifficulty => {
                "Please try again in a moment, or try asking a different question."
            }
        }
    }
}

/// Result of one submitted prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The assistant entry appended to the history.
    pub reply: ChatMessage,
    /// Set when the adapter failed and `reply` is the apology.
    pub notice: Option<FailureNotice>,
}

/// Conversation state of one browser session.
#[derive(Debug)]
pub struct ChatSession {
    endpoint_name: String,
    max_tokens: u32,
    state: SessionState,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            endpoint_name: config.endpoint_name.clone(),
            max_tokens: config.max_tokens,
            state: SessionState::Idle,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
    }

    /// Page load.
    pub fn open(&mut self) {
        if self.state == SessionState::Idle {
            self.transition(SessionState::AwaitingInput);
        }
    }

    /// The reply of the last turn has been shown.
    pub fn rendered(&mut self) {
        if self.state == SessionState::Displaying {
            self.transition(SessionState::AwaitingInput);
        }
    }

    /// Drop the whole history and return to `Idle`.
    pub fn clear(&mut self) {
        self.history.clear();
        self.transition(SessionState::Idle);
    }

    /// Submit a prompt, typed or picked from the examples.
    ///
    /// Adapter failures are not errors here. They are logged and answered
    /// with [`APOLOGY`] plus a classified notice.
    pub async fn submit(
        &mut self,
        prompt: &str,
        adapter: &EndpointAdapter,
    ) -> Result<TurnOutcome, SessionError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }

        if self.state != SessionState::AwaitingInput {
            self.transition(SessionState::AwaitingInput);
        }
        self.transition(SessionState::Processing);

        // The pair is committed together so an abandoned call leaves no
        // unanswered user entry behind.
        let user = ChatMessage::user(prompt);
        let mut pending = self.history.clone();
        pending.push(user.clone());

        let (reply, notice) = match adapter
            .query_endpoint(&self.endpoint_name, &pending, self.max_tokens)
            .await
        {
            Ok(answer) => (ChatMessage::assistant(answer.content), None),
            Err(e) => {
                error!(endpoint = %self.endpoint_name, "error querying endpoint: {e}");
                let notice = FailureNotice::classify(&e.to_string());
                (ChatMessage::assistant(APOLOGY), Some(notice))
            }
        };

        self.history.push(user);
        self.history.push(reply.clone());
        self.transition(SessionState::Displaying);

        Ok(TurnOutcome { reply, notice })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::control_plane::{ControlPlane, ControlPlaneError, EndpointDescriptor};
    use crate::message::Role;
    use crate::strategy::StrategyChain;
    use crate::transport::{DirectTarget, ServingTransport, TransportError};

    struct ChatPlane;

    #[async_trait]
    impl ControlPlane for ChatPlane {
        async fn get_endpoint(&self, name: &str) -> Result<EndpointDescriptor, ControlPlaneError> {
            Ok(EndpointDescriptor {
                name: name.to_string(),
                task_type: Some("agent/v1/responses".into()),
                state: None,
            })
        }

        async fn token(&self) -> Result<String, ControlPlaneError> {
            Ok("t".into())
        }

        fn host(&self) -> Option<String> {
            Some("https://ws.example.com".into())
        }
    }

    /// Control plane that never answers.
    struct SilentPlane;

    #[async_trait]
    impl ControlPlane for SilentPlane {
        async fn get_endpoint(&self, _name: &str) -> Result<EndpointDescriptor, ControlPlaneError> {
            std::future::pending().await
        }

        async fn token(&self) -> Result<String, ControlPlaneError> {
            Ok("t".into())
        }

        fn host(&self) -> Option<String> {
            Some("https://ws.example.com".into())
        }
    }

    /// Answers every predict with the same body, or fails everything.
    struct Fixed(Option<Value>);

    #[async_trait]
    impl ServingTransport for Fixed {
        async fn predict(&self, _endpoint: &str, _inputs: &Value) -> Result<Value, TransportError> {
            self.0
                .clone()
                .ok_or_else(|| TransportError::MalformedResponse("connection reset".into()))
        }

        async fn create_response(
            &self,
            _target: &DirectTarget,
            _model: &str,
            _input: &Value,
        ) -> Result<String, TransportError> {
            Err(TransportError::MalformedResponse("connection reset".into()))
        }
    }

    fn adapter(transport: Fixed) -> EndpointAdapter {
        let plane = Arc::new(ChatPlane);
        EndpointAdapter::new(
            plane.clone(),
            StrategyChain::standard_with(
                Arc::new(transport),
                plane,
                None,
                None,
                Duration::from_secs(5),
            ),
        )
    }

    fn session() -> ChatSession {
        ChatSession::new(&ChatConfig::new("kb-agent"))
    }

    #[tokio::test]
    async fn successful_turn_appends_answer() {
        let adapter = adapter(Fixed(Some(
            json!({"output": [{"content": [{"text": "Work from home 2 days/week."}]}]}),
        )));
        let mut session = session();
        session.open();

        let outcome = session
            .submit("What is the remote work policy?", &adapter)
            .await
            .unwrap();

        assert_eq!(outcome.notice, None);
        assert_eq!(
            session.history(),
            [
                ChatMessage::user("What is the remote work policy?"),
                ChatMessage::assistant("Work from home 2 days/week."),
            ]
        );
        assert_eq!(session.state(), SessionState::Displaying);
        session.rendered();
        assert_eq!(session.state(), SessionState::AwaitingInput);
    }

    #[tokio::test]
    async fn failed_turn_appends_apology() {
        let adapter = adapter(Fixed(None));
        let mut session = session();
        session.open();

        let outcome = session
            .submit("What is the remote work policy?", &adapter)
            .await
            .unwrap();

        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[1].role, Role::Assistant);
        assert_eq!(session.history()[1].content, APOLOGY);
        match outcome.notice {
            Some(FailureNotice::MultipleAttemptsFailed { details }) => {
                assert!(details.starts_with("All approaches failed."));
                assert!(details.chars().count() <= DETAIL_EXCERPT_CHARS);
            }
            other => panic!("unexpected notice: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn turn_completes_when_control_plane_is_silent() {
        let plane = Arc::new(SilentPlane);
        let adapter = EndpointAdapter::new(
            plane.clone(),
            StrategyChain::standard_with(
                Arc::new(Fixed(Some(json!({"predictions": ["ok"]})))),
                plane,
                None,
                None,
                Duration::from_secs(2),
            ),
        );
        let mut session = session();
        session.open();

        let outcome = tokio::time::timeout(
            Duration::from_secs(24 * 60 * 60),
            session.submit("hi", &adapter),
        )
        .await
        .expect("turn finishes")
        .unwrap();

        assert_eq!(outcome.reply, ChatMessage::assistant("ok"));
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn empty_prompt_leaves_history_alone() {
        let adapter = adapter(Fixed(None));
        let mut session = session();
        session.open();

        let err = session.submit("   ", &adapter).await.unwrap_err();
        assert!(matches!(err, SessionError::EmptyPrompt));
        assert!(session.history().is_empty());
        assert_eq!(session.state(), SessionState::AwaitingInput);
    }

    #[tokio::test]
    async fn turns_accumulate_in_order_and_clear_resets() {
        let adapter = adapter(Fixed(Some(json!({"predictions": ["ok"]}))));
        let mut session = session();

        session.submit("first", &adapter).await.unwrap();
        session.rendered();
        session.submit("second", &adapter).await.unwrap();

        let roles: Vec<_> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(session.history()[2].content, "second");

        session.clear();
        assert!(session.history().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn classification_follows_keyword_order() {
        assert_eq!(
            FailureNotice::classify("Invalid Token supplied"),
            FailureNotice::Authentication
        );
        assert_eq!(
            FailureNotice::classify("AUTHENTICATION required"),
            FailureNotice::Authentication
        );
        assert_eq!(
            FailureNotice::classify("Schema mismatch in input"),
            FailureNotice::Validation
        );
        assert_eq!(
            FailureNotice::classify("validation failed for field input"),
            FailureNotice::Validation
        );
        assert!(matches!(
            FailureNotice::classify("All approaches failed. a: x"),
            FailureNotice::MultipleAttemptsFailed { .. }
        ));
        assert_eq!(
            FailureNotice::classify("connection reset by peer"),
            FailureNotice::TechnicalDifficulty
        );
        // Authentication wins over exhaustion.
        assert_eq!(
            FailureNotice::classify("All approaches failed. responses_api: No authentication token available"),
            FailureNotice::Authentication
        );
    }

    #[test]
    fn unsupported_endpoint_message_is_generic() {
        let err = crate::adapter::AdapterError::UnsupportedEndpointType("kb".into());
        assert_eq!(
            FailureNotice::classify(&err.to_string()),
            FailureNotice::TechnicalDifficulty
        );
    }

    #[test]
    fn examples_have_two_groups_of_four() {
        assert_eq!(EXAMPLE_GROUPS.len(), 2);
        assert!(EXAMPLE_GROUPS.iter().all(|g| g.questions.len() == 4));
    }
}
