use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::ApiResult;
use crate::llm::{ChatMessage, CompletionRequest, ContentBlock, LlmProvider, StopReason};
use crate::tools::ToolRegistry;

/// Per-session conversation state and the function-calling loop.
///
/// Sessions are independent and assumed to see one request at a time.
/// History is kept for the process lifetime with no eviction; see
/// DESIGN.md for the retention decision.
pub struct ChatManager {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    sessions: Mutex<HashMap<String, Vec<ChatMessage>>>,
    max_tokens: u32,
    temperature: f32,
}

impl ChatManager {
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            provider,
            registry,
            sessions: Mutex::new(HashMap::new()),
            max_tokens,
            temperature,
        }
    }

    /// Run one user turn: send the session history plus the new message,
    /// execute any requested tool calls (tool results are always text,
    /// the registry never raises), and return the model's final answer.
    /// Model errors propagate; the route decides how to report them.
    pub async fn chat(&self, session_id: &str, message: &str) -> ApiResult<String> {
        // Snapshot the history so other sessions are not blocked while the
        // model call is in flight. Last writer wins per session.
        let mut history = {
            let sessions = self.sessions.lock().await;
            sessions.get(session_id).cloned().unwrap_or_default()
        };

        history.push(ChatMessage::user(message));
        let tools = self.registry.definitions();

        let reply = loop {
            let response = self
                .provider
                .complete(CompletionRequest {
                    messages: history.clone(),
                    tools: tools.clone(),
                    max_tokens: self.max_tokens,
                    temperature: self.temperature,
                })
                .await?;

            let tool_uses: Vec<(String, String, serde_json::Value)> = response
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            history.push(ChatMessage::assistant(response.content_blocks.clone()));

            if tool_uses.is_empty() || response.stop_reason != StopReason::ToolUse {
                break response.content;
            }

            let mut results = Vec::with_capacity(tool_uses.len());
            for (id, name, input) in tool_uses {
                let args = input.as_object().cloned().unwrap_or_default();
                let result = self.registry.execute(&name, args).await;
                log::debug!("Tool {name} returned {} chars", result.len());
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    content: result,
                });
            }
            history.push(ChatMessage::tool_results(results));
        };

        self.sessions
            .lock()
            .await
            .insert(session_id.to_string(), history);

        Ok(reply)
    }

    /// Number of turns stored for a session (test/diagnostics helper).
    pub async fn session_len(&self, session_id: &str) -> usize {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;
    use serde_json::json;

    use super::*;
    use crate::llm::{MockProvider, ToolDefinition};

    fn registry_with_echo() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolDefinition {
                name: "get_state".to_string(),
                description: String::new(),
                input_schema: json!({"type": "object"}),
            },
            |args| {
                async move {
                    Ok(format!(
                        "state of {}",
                        args.get("entity_id").and_then(|v| v.as_str()).unwrap_or("?")
                    ))
                }
                .boxed()
            },
        );
        Arc::new(registry)
    }

    #[tokio::test]
    async fn plain_answer_passes_through() {
        let provider = Arc::new(MockProvider::new(vec![MockProvider::text_response(
            "All lights are off.",
        )]));
        let manager = ChatManager::new(provider, registry_with_echo(), 512, 0.7);

        let reply = manager.chat("alice", "are the lights off?").await.unwrap();
        assert_eq!(reply, "All lights are off.");
        // user turn + assistant turn
        assert_eq!(manager.session_len("alice").await, 2);
    }

    #[tokio::test]
    async fn tool_calls_are_executed_and_fed_back() {
        let provider = Arc::new(MockProvider::new(vec![
            MockProvider::tool_response("call_1", "get_state", json!({"entity_id": "light.a"})),
            MockProvider::text_response("The light is on."),
        ]));
        let manager = ChatManager::new(provider, registry_with_echo(), 512, 0.7);

        let reply = manager.chat("bob", "check light.a").await.unwrap();
        assert_eq!(reply, "The light is on.");
        // user, assistant(tool_use), tool results, assistant(final)
        assert_eq!(manager.session_len("bob").await, 4);
    }

    #[tokio::test]
    async fn unknown_tool_still_yields_a_result_turn() {
        let provider = Arc::new(MockProvider::new(vec![
            MockProvider::tool_response("call_1", "does_not_exist", json!({})),
            MockProvider::text_response("Sorry, I could not do that."),
        ]));
        let manager = ChatManager::new(provider, registry_with_echo(), 512, 0.7);

        let reply = manager.chat("carol", "do something odd").await.unwrap();
        assert_eq!(reply, "Sorry, I could not do that.");
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let provider = Arc::new(MockProvider::new(vec![
            MockProvider::text_response("one"),
            MockProvider::text_response("two"),
        ]));
        let manager = ChatManager::new(provider, registry_with_echo(), 512, 0.7);

        manager.chat("a", "hi").await.unwrap();
        manager.chat("b", "hi").await.unwrap();

        assert_eq!(manager.session_len("a").await, 2);
        assert_eq!(manager.session_len("b").await, 2);
    }
}
