//! OpenAI-compatible chat-completions provider with function calling.
//!
//! One wire format covers the hosted models this backend targets (Gemini,
//! OpenAI, DeepSeek and friends all speak it); the concrete model and
//! endpoint come from configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use huginn_api::config::LlmConfig;

use crate::error::{ApiError, ApiResult};
use crate::llm::{
    ChatMessage, CompletionRequest, CompletionResponse, ContentBlock, LlmError, LlmProvider, Role,
    StopReason, ToolDefinition,
};

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
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
    /// JSON-encoded argument object.
    arguments: String,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef<'a>,
}

#[derive(Serialize)]
struct WireFunctionDef<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

pub struct HttpProvider {
    model: String,
    endpoint: String,
    api_key: String,
    http: reqwest::Client,
}

impl HttpProvider {
    pub fn from_config(config: &LlmConfig) -> ApiResult<Self> {
        let key_env = config.api_key_env_name();
        let api_key = std::env::var(key_env)
            .map_err(|_| ApiError::service_error(format!("Missing model API key env var {key_env}")))?;

        let base = config.base_url.as_str().trim_end_matches('/').to_string();
        Ok(Self {
            model: config.model.clone(),
            endpoint: format!("{base}/chat/completions"),
            api_key,
            http: reqwest::Client::new(),
        })
    }

    fn wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage> {
        let mut wire = Vec::with_capacity(messages.len());

        for message in messages {
            if message.content_blocks.is_empty() {
                wire.push(WireMessage {
                    role: role_str(message.role),
                    content: Some(message.content.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                });
                continue;
            }

            // Tool requests ride on an assistant turn; each tool result
            // becomes its own `tool` role message.
            let mut tool_calls = Vec::new();
            for block in &message.content_blocks {
                match block {
                    ContentBlock::ToolUse { id, name, input } => tool_calls.push(WireToolCall {
                        id: id.clone(),
                        kind: "function".to_string(),
                        function: WireFunctionCall {
                            name: name.clone(),
                            arguments: input.to_string(),
                        },
                    }),
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    } => wire.push(WireMessage {
                        role: "tool",
                        content: Some(content.clone()),
                        tool_calls: None,
                        tool_call_id: Some(tool_use_id.clone()),
                    }),
                    ContentBlock::Text { .. } => {}
                }
            }

            if !tool_calls.is_empty() || !message.content.is_empty() {
                wire.push(WireMessage {
                    role: role_str(message.role),
                    content: (!message.content.is_empty()).then(|| message.content.clone()),
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                    tool_call_id: None,
                });
            }
        }

        wire
    }

    fn wire_tools(tools: &[ToolDefinition]) -> Vec<WireTool<'_>> {
        tools
            .iter()
            .map(|tool| WireTool {
                kind: "function",
                function: WireFunctionDef {
                    name: &tool.name,
                    description: &tool.description,
                    parameters: &tool.input_schema,
                },
            })
            .collect()
    }

    fn parse_choice(choice: WireChoice) -> CompletionResponse {
        let mut blocks = Vec::new();
        let content = choice.message.content.unwrap_or_default();
        if !content.is_empty() {
            blocks.push(ContentBlock::Text {
                text: content.clone(),
            });
        }

        for call in choice.message.tool_calls.unwrap_or_default() {
            let input = serde_json::from_str(&call.function.arguments)
                .unwrap_or_else(|_| serde_json::json!({}));
            let id = if call.id.is_empty() {
                Uuid::new_v4().to_string()
            } else {
                call.id
            };
            blocks.push(ContentBlock::ToolUse {
                id,
                name: call.function.name,
                input,
            });
        }

        let stop_reason = match choice.finish_reason.as_deref() {
            Some("tool_calls") => StopReason::ToolUse,
            Some("length") => StopReason::MaxTokens,
            _ if blocks
                .iter()
                .any(|b| matches!(b, ContentBlock::ToolUse { .. })) =>
            {
                StopReason::ToolUse
            }
            _ => StopReason::EndTurn,
        };

        CompletionResponse {
            content,
            content_blocks: blocks,
            stop_reason,
        }
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = WireRequest {
            model: &self.model,
            messages: Self::wire_messages(&request.messages),
            tools: Self::wire_tools(&request.tools),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed(format!("{status}: {text}")));
        }

        let api: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        api.choices
            .into_iter()
            .next()
            .map(Self::parse_choice)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_choice_maps_tool_calls() {
        let choice = WireChoice {
            message: WireChoiceMessage {
                content: None,
                tool_calls: Some(vec![WireToolCall {
                    id: "call_1".to_string(),
                    kind: "function".to_string(),
                    function: WireFunctionCall {
                        name: "list_areas".to_string(),
                        arguments: "{}".to_string(),
                    },
                }]),
            },
            finish_reason: Some("tool_calls".to_string()),
        };

        let parsed = HttpProvider::parse_choice(choice);
        assert_eq!(parsed.stop_reason, StopReason::ToolUse);
        assert_eq!(parsed.tool_uses().len(), 1);
        assert_eq!(parsed.tool_uses()[0].1, "list_areas");
    }

    #[test]
    fn parse_choice_tolerates_malformed_arguments() {
        let choice = WireChoice {
            message: WireChoiceMessage {
                content: None,
                tool_calls: Some(vec![WireToolCall {
                    id: String::new(),
                    kind: "function".to_string(),
                    function: WireFunctionCall {
                        name: "get_state".to_string(),
                        arguments: "{not json".to_string(),
                    },
                }]),
            },
            finish_reason: None,
        };

        let parsed = HttpProvider::parse_choice(choice);
        let uses = parsed.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(*uses[0].2, serde_json::json!({}));
        assert!(!uses[0].0.is_empty());
        assert_eq!(parsed.stop_reason, StopReason::ToolUse);
    }

    #[test]
    fn wire_messages_splits_tool_results() {
        let messages = vec![
            ChatMessage::user("turn on the lights"),
            ChatMessage::assistant(vec![ContentBlock::ToolUse {
                id: "call_1".to_string(),
                name: "call_service".to_string(),
                input: serde_json::json!({"domain": "light"}),
            }]),
            ChatMessage::tool_results(vec![ContentBlock::ToolResult {
                tool_use_id: "call_1".to_string(),
                content: "Service light.turn_on called".to_string(),
            }]),
        ];

        let wire = HttpProvider::wire_messages(&messages);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0].role, "user");
        assert_eq!(wire[1].role, "assistant");
        assert!(wire[1].tool_calls.is_some());
        assert_eq!(wire[2].role, "tool");
        assert_eq!(wire[2].tool_call_id.as_deref(), Some("call_1"));
    }
}
