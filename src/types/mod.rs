//! Core data types shared across the gateway.

use serde::{Deserialize, Serialize};

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation. The ordered sequence forms the
/// conversation context; the gateway never persists messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

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

/// Decoded event from a provider stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text delta.
    Chunk { content: String },
    /// Normal end of stream.
    Done { message_id: Option<String> },
    /// In-band provider failure.
    Error { message: String },
    /// Conversation title produced alongside the response.
    Title { title: String },
}

/// Result of a non-streaming chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub tokens_used: u64,
}

/// Streaming callback set, stable across provider backends.
///
/// `on_done` always fires exactly once on the normal completion path,
/// including cancellation (with whatever partial text exists). `on_error`
/// fires only when every routing candidate has been exhausted.
pub trait StreamHandler: Send {
    fn on_chunk(&mut self, text: &str);
    fn on_done(&mut self, full_text: &str, message_id: Option<&str>);
    fn on_error(&mut self, message: &str);
    fn on_title_update(&mut self, _title: &str) {}
}

/// Billable action kind, as seen by the access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Chat,
    Image,
    Video,
    Search,
}

impl Action {
    /// Search is self-hosted and never consumes budget.
    pub fn has_cost(self) -> bool {
        !matches!(self, Action::Search)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Chat => "chat",
            Action::Image => "image",
            Action::Video => "video",
            Action::Search => "search",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::user("hi");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "hi");
        assert_eq!(ChatMessage::system("s").role, Role::System);
        assert_eq!(ChatMessage::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&ChatMessage::user("hello")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
    }

    #[test]
    fn test_action_cost() {
        assert!(Action::Chat.has_cost());
        assert!(Action::Image.has_cost());
        assert!(!Action::Search.has_cost());
    }
}
