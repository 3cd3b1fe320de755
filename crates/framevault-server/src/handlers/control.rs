use axum::extract::State;
use axum::response::{IntoResponse, Response};

use crate::error::ServerError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct ControlRequest {
    pub cmd: String,
}

/// POST /control — enqueue a capture command for the polling device.
pub async fn enqueue(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<ControlRequest>,
) -> Result<Response, ServerError> {
    let cmd = body.cmd.trim().to_ascii_uppercase();
    if cmd != "START" && cmd != "STOP" {
        return Err(ServerError::BadRequest(format!("bad cmd: '{}'", body.cmd)));
    }
    state.inner.control.push(cmd);
    Ok(axum::Json(serde_json::json!({ "ok": true })).into_response())
}

/// GET /pop_cmd — device poll; the oldest queued command, or NONE.
pub async fn pop(State(state): State<AppState>) -> Response {
    match state.inner.control.pop() {
        Some(command) => axum::Json(command).into_response(),
        None => axum::Json(serde_json::json!({ "cmd": "NONE" })).into_response(),
    }
}
