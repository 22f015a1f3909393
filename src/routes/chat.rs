use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;

use huginn_api::chat::{ChatRequest, ChatResponse};

use crate::routes::RouteResult;
use crate::server::appstate::AppState;

/// Session identity comes from the `x-chat-session` header; callers
/// without one share the default session.
const SESSION_HEADER: &str = "x-chat-session";
const DEFAULT_SESSION: &str = "default";

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

async fn post_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> RouteResult<Json<ChatResponse>> {
    let session = session_id(&headers);
    let response = state.chat().chat(&session, &request.message).await?;
    Ok(Json(ChatResponse { response }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(post_chat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_header_overrides_default() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_id(&headers), "default");

        headers.insert(SESSION_HEADER, HeaderValue::from_static("alice"));
        assert_eq!(session_id(&headers), "alice");

        headers.insert(SESSION_HEADER, HeaderValue::from_static("   "));
        assert_eq!(session_id(&headers), "default");
    }
}
