pub mod catalog;
pub mod control;
pub mod ingest;
#[cfg(test)]
pub mod test_helpers;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let authed = Router::new()
        .route("/upload", axum::routing::post(ingest::upload))
        .route("/delete", axum::routing::post(ingest::delete))
        .route("/api/log", axum::routing::get(catalog::frame_log))
        .route("/api/stats", axum::routing::get(catalog::stats))
        .route("/control", axum::routing::post(control::enqueue))
        .route("/pop_cmd", axum::routing::get(control::pop))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Gallery reads and the health endpoint are unauthenticated
    let public = Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/recent", axum::routing::get(catalog::recent))
        .route("/api/gallery", axum::routing::get(catalog::gallery))
        .route("/api/gallery/split", axum::routing::get(catalog::gallery_split))
        .route("/api/devices", axum::routing::get(catalog::devices))
        .route("/uploads/{name}", axum::routing::get(catalog::serve_upload));

    let body_limit = state.inner.config.max_upload_bytes;
    public
        .merge(authed)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health — unauthenticated health check.
async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn auth_middleware(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let expected = state.inner.config.token.as_bytes();

    // No configured secret disables the check entirely
    if expected.is_empty() {
        return next.run(req).await;
    }

    let provided = req
        .headers()
        .get("X-Auth-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided.as_bytes().ct_eq(expected).into() {
        next.run(req).await
    } else {
        (StatusCode::UNAUTHORIZED, "invalid or missing token").into_response()
    }
}
