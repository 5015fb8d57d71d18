//! Conversation messages and their outbound projection.

use serde::{Deserialize, Serialize};

/// Speaker of a conversation message.
///
/// Anything that is not `"assistant"` deserializes as `User`, including a
/// missing role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    #[default]
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }
}

/// One entry of a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Transport-neutral `{role, content}` pair sent on the `input` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
        }
    }
}

/// Project a history into the message list shared by the payload strategies.
pub fn project(history: &[ChatMessage]) -> Vec<WireMessage<'_>> {
    history.iter().map(WireMessage::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_role_and_content_default() {
        let msg: ChatMessage = serde_json::from_str("{}").unwrap();
        assert_eq!(msg, ChatMessage::user(""));
    }

    #[test]
    fn unknown_role_becomes_user() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"system","content":"be brief"}"#).unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "be brief");
    }

    #[test]
    fn assistant_role_round_trips() {
        let msg = ChatMessage::assistant("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
        let back: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn projection_keeps_order() {
        let history = vec![
            ChatMessage::user("q1"),
            ChatMessage::assistant("a1"),
            ChatMessage::user("q2"),
        ];
        let wire = serde_json::to_value(project(&history)).unwrap();
        assert_eq!(
            wire,
            serde_json::json!([
                {"role": "user", "content": "q1"},
                {"role": "assistant", "content": "a1"},
                {"role": "user", "content": "q2"},
            ])
        );
    }
}
