use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use showroom_agent::{ActionResponse, ActionRouter};

/// `POST /actions`: one tool-invocation envelope in, one response envelope out.
///
/// The HTTP status mirrors the envelope's `statusCode`.
pub fn router(action_router: ActionRouter) -> Router {
    Router::new().route("/actions", post(invoke)).with_state(action_router)
}

pub async fn invoke(
    State(action_router): State<ActionRouter>,
    Json(envelope): Json<Value>,
) -> (StatusCode, Json<ActionResponse>) {
    let response = action_router.dispatch(envelope).await;
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response))
}
