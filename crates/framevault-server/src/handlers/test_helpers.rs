use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use framevault_core::framelog::FrameLog;
use framevault_core::FrameStore;
use tower::ServiceExt;

use crate::config::ServerSection;
use crate::state::AppState;

pub const TEST_TOKEN: &str = "test-token";
const BOUNDARY: &str = "framevault-test-boundary";

/// Create a wired-up router and AppState backed by a temp directory.
pub async fn setup_app(max_keep: usize) -> (Router, AppState, tempfile::TempDir) {
    setup_app_with(max_keep, false, TEST_TOKEN).await
}

pub async fn setup_app_with(
    max_keep: usize,
    with_log: bool,
    token: &str,
) -> (Router, AppState, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("create tempdir");
    let data_dir = tmp.path().to_path_buf();

    let config = ServerSection {
        data_dir: data_dir.to_string_lossy().into_owned(),
        token: token.to_string(),
        max_keep,
        frame_log: with_log,
        ..Default::default()
    };

    let mut store = FrameStore::new(data_dir.join("uploads"), max_keep);
    if with_log {
        let log = FrameLog::open(data_dir.join("frames.csv"))
            .await
            .expect("open frame log");
        store = store.with_frame_log(log);
    }
    store.init().await.expect("init store");

    let state = AppState::new(config, store);
    let router = super::router(state.clone());
    (router, state, tmp)
}

/// Encode a multipart/form-data body; `image`, when given, is added as a
/// file part named "image".
pub fn multipart_body(fields: &[(&str, &str)], image: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(bytes) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; \
                 filename=\"frame.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Send a multipart POST with optional token and extra headers.
pub async fn post_multipart(
    router: Router,
    path: &str,
    token: Option<&str>,
    headers: &[(&str, &str)],
    body: Vec<u8>,
) -> axum::response::Response {
    let mut builder = Request::builder().method("POST").uri(path).header(
        "Content-Type",
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header("X-Auth-Token", token);
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    router
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// Send a JSON POST with optional token.
pub async fn post_json(
    router: Router,
    path: &str,
    token: Option<&str>,
    body: Vec<u8>,
) -> axum::response::Response {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("X-Auth-Token", token);
    }
    router
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// Send a GET with optional token.
pub async fn get(router: Router, path: &str, token: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(token) = token {
        builder = builder.header("X-Auth-Token", token);
    }
    router
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Read full response body into `Vec<u8>`.
pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("collect body")
        .to_vec()
}

/// Assert response has expected status.
pub fn assert_status(response: &axum::response::Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "expected {expected}, got {}",
        response.status()
    );
}
