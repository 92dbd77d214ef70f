//! Reasoning engine integration.
//!
//! The orchestrator talks to a non-deterministic external reasoning service
//! through the [`ReasoningEngine`] trait. One client is constructed at
//! startup and injected explicitly — no process-wide singleton. The concrete
//! HTTP implementation lives in [`openai`].

pub mod openai;

pub use openai::OpenAiEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ── Chat transcript types ───────────────────────────────────────────

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single turn in a conversation transcript.
///
/// Ordered, append-only within one transaction. Tool turns carry the
/// correlation id of the request they answer; assistant turns that requested
/// tools carry the requests themselves so round 2 sees the full exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Correlation id — set on tool turns only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name — set on tool turns only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool-call requests — set on the assistant turn that emitted them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant turn carrying round-1 tool-call requests.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.unwrap_or_default(),
            tool_call_id: None,
            name: None,
            tool_calls: calls,
        }
    }

    /// Tool turn answering one request, correlated by id.
    pub fn tool(correlation_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(correlation_id.into()),
            name: Some(name.into()),
            tool_calls: Vec::new(),
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            name: None,
            tool_calls: Vec::new(),
        }
    }
}

/// A tool call requested by the engine during round 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlation id — every request yields exactly one result with this id.
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A tool advertised to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: serde_json::Value,
}

// ── Requests and replies ────────────────────────────────────────────

/// One completion call against the engine.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Full working transcript, oldest first (no system turn).
    pub messages: Vec<ChatMessage>,
    /// Tools offered this round. `None` on round 2 — tool calls never
    /// recurse beyond a single round.
    pub tools: Option<Vec<ToolDefinition>>,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages,
            tools: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// Engine reply — free text, tool-call requests, or both.
#[derive(Debug, Clone, Default)]
pub struct EngineReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl EngineReply {
    /// Reply text, empty string if the engine sent only tool calls.
    pub fn text(&self) -> String {
        self.content.clone().unwrap_or_default()
    }
}

// ── Trait ───────────────────────────────────────────────────────────

/// External reasoning service. Synchronous per call; the only suspension
/// points in a chat transaction are here and in the tool adapters.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<EngineReply, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_turn_carries_correlation() {
        let msg = ChatMessage::tool("call_1", "order_lookup", "{\"found\":true}");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.name.as_deref(), Some("order_lookup"));
    }

    #[test]
    fn plain_turns_serialize_without_tool_fields() {
        let json = serde_json::to_value(ChatMessage::user("hello")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
        assert!(json.get("tool_call_id").is_none());
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn history_roundtrips_through_serde() {
        let history = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant_tool_calls(
                None,
                vec![ToolCallRequest {
                    id: "call_1".into(),
                    name: "order_lookup".into(),
                    arguments: serde_json::json!({"order_number": "1001"}),
                }],
            ),
            ChatMessage::tool("call_1", "order_lookup", "{}"),
            ChatMessage::assistant("done"),
        ];
        let json = serde_json::to_string(&history).unwrap();
        let back: Vec<ChatMessage> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 4);
        assert_eq!(back[1].tool_calls.len(), 1);
        assert_eq!(back[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn request_without_tools_by_default() {
        let req = CompletionRequest::new("prompt", vec![ChatMessage::user("x")]);
        assert!(req.tools.is_none());
    }
}
