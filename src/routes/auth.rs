use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use serde::Deserialize;

use crate::routes::RouteResult;
use crate::server::appstate::AppState;

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    email: String,
}

/// Email allow-list check: 200 when the address has a user row, 403
/// otherwise, 503 when no database is configured.
async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> RouteResult<StatusCode> {
    let Some(users) = state.users() else {
        return Ok(StatusCode::SERVICE_UNAVAILABLE);
    };

    match users.find_by_email(&query.email).await? {
        Some(_) => Ok(StatusCode::OK),
        None => Ok(StatusCode::FORBIDDEN),
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/verify", get(verify_email))
}
