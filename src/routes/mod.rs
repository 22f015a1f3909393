pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod mcp;

use std::error::Error;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use crate::server::appstate::AppState;

/// Thin error wrapper so handlers can use `?` on any error type. Failures
/// are logged and rendered as `{"error": …}` with a 500. Upstream outages
/// on read paths never reach this point; they degrade to empty data at the
/// client boundary.
#[derive(Debug, Serialize)]
pub struct RouteError(String);

pub type RouteResult<T> = Result<T, RouteError>;

impl<E: Error> From<E> for RouteError {
    fn from(value: E) -> Self {
        Self(value.to_string())
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        log::error!("Request failed: {}", self.0);

        let res = json!({"error": self.0});

        (StatusCode::INTERNAL_SERVER_ERROR, Json(res)).into_response()
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/api/dashboard", dashboard::router())
        .nest("/api/chat", chat::router())
        .nest("/api/public/auth", auth::router())
        .nest("/mcp", mcp::router())
}
