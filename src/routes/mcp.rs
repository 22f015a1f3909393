use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures::StreamExt;
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::server::appstate::AppState;

// MCP surface over the tool registry: a JSON-RPC message endpoint plus an
// SSE stream that announces it. Responses ride on the POST response body.

const PROTOCOL_VERSION: &str = "2024-11-05";
const MESSAGE_ENDPOINT: &str = "/mcp/message";

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

fn rpc_result(id: Value, result: Value) -> Json<Value> {
    Json(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

fn rpc_error(id: Value, code: i64, message: &str) -> Json<Value> {
    Json(json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message},
    }))
}

fn tool_listing(state: &AppState) -> Value {
    let tools: Vec<Value> = state
        .registry()
        .definitions()
        .into_iter()
        .map(|def| {
            json!({
                "name": def.name,
                "description": def.description,
                "inputSchema": def.input_schema,
            })
        })
        .collect();
    json!({"tools": tools})
}

async fn call_tool(state: &AppState, params: &Value) -> Value {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let arguments: Map<String, Value> = params
        .get("arguments")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let text = state.registry().execute(name, arguments).await;
    // The registry renders failures as text; surface them as tool errors
    // so MCP clients can distinguish them from normal output.
    let is_error =
        text.starts_with("Error executing tool") || text.starts_with("Unknown function");

    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error,
    })
}

async fn post_message(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> Response {
    // Notifications get an acknowledgement without a body.
    let Some(id) = request.id else {
        return StatusCode::ACCEPTED.into_response();
    };

    match request.method.as_str() {
        "initialize" => rpc_result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        )
        .into_response(),
        "ping" => rpc_result(id, json!({})).into_response(),
        "tools/list" => rpc_result(id, tool_listing(&state)).into_response(),
        "tools/call" => {
            let result = call_tool(&state, &request.params).await;
            rpc_result(id, result).into_response()
        }
        other => {
            log::debug!("Unhandled MCP method {other}");
            rpc_error(id, -32601, "Method not found").into_response()
        }
    }
}

/// Long-lived announce stream. The first event tells the client where to
/// POST messages; keep-alives stop intermediaries from tearing the
/// connection down.
async fn get_sse() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let endpoint = stream::iter([Ok::<_, Infallible>(
        Event::default().event("endpoint").data(MESSAGE_ENDPOINT),
    )]);

    Sse::new(endpoint.chain(stream::pending())).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text(": ping"),
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/message", post(post_message))
        .route("/sse", get(get_sse))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::backend::hass::client::HubApi;
    use crate::backend::yr::{ForecastApi, LocationForecast};
    use crate::error::ApiResult;
    use crate::llm::{LlmProvider, MockProvider};
    use crate::model::{EnhancedEntityState, EntityState};

    struct StubHub;

    #[async_trait]
    impl HubApi for StubHub {
        async fn fetch_all_states(&self) -> ApiResult<Vec<EntityState>> {
            Ok(Vec::new())
        }

        async fn fetch_areas(&self) -> ApiResult<Vec<String>> {
            Ok(vec!["Kitchen".to_string()])
        }

        async fn fetch_enhanced_entities(
            &self,
            _domain: Option<&str>,
            _area: Option<&str>,
        ) -> ApiResult<Vec<EnhancedEntityState>> {
            Ok(Vec::new())
        }

        async fn invoke_service(
            &self,
            _domain: &str,
            _service: &str,
            _entity_id: &str,
            _payload: Map<String, Value>,
        ) -> ApiResult<()> {
            Ok(())
        }
    }

    struct StubForecast;

    #[async_trait]
    impl ForecastApi for StubForecast {
        async fn fetch_forecast(&self, _lat: f64, _lon: f64) -> Option<LocationForecast> {
            None
        }
    }

    fn state() -> AppState {
        let provider: Arc<dyn LlmProvider> = Arc::new(MockProvider::new(Vec::new()));
        AppState::for_tests(Arc::new(StubHub), provider, Arc::new(StubForecast))
    }

    fn request(id: Option<Value>, method: &str, params: Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn tools_list_exposes_registry_names() {
        let response = post_message(
            State(state()),
            Json(request(Some(json!(1)), "tools/list", Value::Null)),
        )
        .await;

        let body = body_json(response).await;
        let names: Vec<&str> = body["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["list_areas", "list_entities", "get_state", "call_service"]
        );
    }

    #[tokio::test]
    async fn tools_call_returns_text_content() {
        let app = state();
        app.cache().refresh().await;

        let response = post_message(
            State(app),
            Json(request(
                Some(json!(2)),
                "tools/call",
                json!({"name": "list_areas", "arguments": {}}),
            )),
        )
        .await;

        let body = body_json(response).await;
        assert_eq!(body["result"]["isError"], json!(false));
        assert_eq!(body["result"]["content"][0]["text"], json!("Kitchen"));
    }

    #[tokio::test]
    async fn unknown_tool_is_flagged_as_error() {
        let response = post_message(
            State(state()),
            Json(request(
                Some(json!(3)),
                "tools/call",
                json!({"name": "nope", "arguments": {}}),
            )),
        )
        .await;

        let body = body_json(response).await;
        assert_eq!(body["result"]["isError"], json!(true));
    }

    #[tokio::test]
    async fn unknown_method_yields_rpc_error() {
        let response = post_message(
            State(state()),
            Json(request(Some(json!(4)), "resources/list", Value::Null)),
        )
        .await;

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], json!(-32601));
    }

    #[tokio::test]
    async fn notifications_are_acknowledged_without_body() {
        let response = post_message(
            State(state()),
            Json(request(None, "notifications/initialized", Value::Null)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
