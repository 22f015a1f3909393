pub mod facade;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::llm::ToolDefinition;

type ToolHandler =
    Arc<dyn Fn(Map<String, Value>) -> BoxFuture<'static, crate::error::ApiResult<String>> + Send + Sync>;

/// Registry mapping tool names to handlers. Each handler carries its own
/// JSON-Schema declaration, so adding a tool is additive.
///
/// `execute` never fails: handler errors and unknown names both come back
/// as text, because the callers (the chat loop and the MCP surface) expect
/// a textual tool result for every call.
pub struct ToolRegistry {
    tools: Vec<(ToolDefinition, ToolHandler)>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register<F>(&mut self, definition: ToolDefinition, handler: F)
    where
        F: Fn(Map<String, Value>) -> BoxFuture<'static, crate::error::ApiResult<String>>
            + Send
            + Sync
            + 'static,
    {
        self.tools.push((definition, Arc::new(handler)));
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|(def, _)| def.clone()).collect()
    }

    pub async fn execute(&self, name: &str, args: Map<String, Value>) -> String {
        let Some((_, handler)) = self.tools.iter().find(|(def, _)| def.name == name) else {
            return format!("Unknown function {name}");
        };

        match handler(args).await {
            Ok(result) => result,
            Err(err) => format!("Error executing tool {name}: {err}"),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// String argument lookup treating an empty string as absent, the way the
/// model tends to fill optional parameters.
#[must_use]
pub fn arg_str(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
