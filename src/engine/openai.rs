//! OpenAI-compatible chat-completions client.
//!
//! Speaks the `/chat/completions` wire format over reqwest. Tool-call
//! arguments arrive as a JSON-encoded string; they are parsed here so the
//! rest of the crate only ever sees structured values. A malformed arguments
//! string becomes `null` and is rejected later by the dispatcher's argument
//! validation rather than aborting the transaction.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::engine::{
    ChatMessage, CompletionRequest, EngineReply, ReasoningEngine, Role, ToolCallRequest,
    ToolDefinition,
};
use crate::error::EngineError;

/// Reasoning engine backed by an OpenAI-compatible HTTP endpoint.
pub struct OpenAiEngine {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl OpenAiEngine {
    pub fn new(base_url: impl Into<String>, api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl ReasoningEngine for OpenAiEngine {
    async fn complete(&self, request: CompletionRequest) -> Result<EngineReply, EngineError> {
        let body = WireRequest::from_request(&self.model, &request);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::InvalidResponse("no choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallRequest {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::Null),
            })
            .collect();

        Ok(EngineReply {
            content: choice.message.content,
            tool_calls,
        })
    }
}

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

impl WireRequest {
    fn from_request(model: &str, request: &CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage {
            role: "system".into(),
            content: Some(request.system_prompt.clone()),
            tool_call_id: None,
            name: None,
            tool_calls: None,
        });
        messages.extend(request.messages.iter().map(WireMessage::from_chat));

        Self {
            model: model.to_string(),
            messages,
            tools: request
                .tools
                .as_ref()
                .map(|tools| tools.iter().map(WireTool::from_definition).collect()),
        }
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

impl WireMessage {
    fn from_chat(msg: &ChatMessage) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        let tool_calls = if msg.tool_calls.is_empty() {
            None
        } else {
            Some(
                msg.tool_calls
                    .iter()
                    .map(|tc| WireToolCall {
                        id: tc.id.clone(),
                        kind: "function".into(),
                        function: WireFunctionCall {
                            name: tc.name.clone(),
                            arguments: tc.arguments.to_string(),
                        },
                    })
                    .collect(),
            )
        };
        Self {
            role: role.into(),
            content: Some(msg.content.clone()),
            tool_call_id: msg.tool_call_id.clone(),
            name: msg.name.clone(),
            tool_calls,
        }
    }
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionDef,
}

impl WireTool {
    fn from_definition(def: &ToolDefinition) -> Self {
        Self {
            kind: "function".into(),
            function: WireFunctionDef {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters.clone(),
            },
        }
    }
}

#[derive(Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded argument object, as the wire format ships it.
    arguments: String,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_leads_the_wire_transcript() {
        let req = CompletionRequest::new("be helpful", vec![ChatMessage::user("hi")]);
        let wire = WireRequest::from_request("gpt-4o-mini", &req);
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[0].content.as_deref(), Some("be helpful"));
        assert_eq!(wire.messages[1].role, "user");
        assert!(wire.tools.is_none());
    }

    #[test]
    fn tool_calls_serialize_with_string_arguments() {
        let msg = ChatMessage::assistant_tool_calls(
            None,
            vec![ToolCallRequest {
                id: "call_9".into(),
                name: "product_lookup".into(),
                arguments: serde_json::json!({"search_term": "tee"}),
            }],
        );
        let wire = WireMessage::from_chat(&msg);
        let calls = wire.tool_calls.unwrap();
        assert_eq!(calls[0].id, "call_9");
        assert_eq!(calls[0].function.name, "product_lookup");
        // Arguments travel as an encoded string on this wire format.
        let parsed: serde_json::Value = serde_json::from_str(&calls[0].function.arguments).unwrap();
        assert_eq!(parsed["search_term"], "tee");
    }

    #[test]
    fn response_tool_call_arguments_parse() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "order_lookup", "arguments": "{\"order_number\":\"1001\"}"}
                    }]
                }
            }]
        }"#;
        let wire: WireResponse = serde_json::from_str(raw).unwrap();
        let call = &wire.choices[0].message.tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.function.name, "order_lookup");
    }

    #[test]
    fn tools_omitted_from_wire_when_absent() {
        let req = CompletionRequest::new("p", vec![ChatMessage::user("x")]);
        let wire = WireRequest::from_request("m", &req);
        let json = serde_json::to_value(&wire).unwrap();
        assert!(json.get("tools").is_none());
    }
}
