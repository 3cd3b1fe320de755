use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use framevault_core::IngestRequest;

use crate::error::ServerError;
use crate::state::AppState;

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

fn bad_multipart(e: MultipartError) -> ServerError {
    ServerError::BadRequest(format!("invalid multipart body: {e}"))
}

fn header_str(headers: &HeaderMap, key: &str) -> Option<String> {
    headers
        .get(key)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// POST /upload — multipart frame ingestion.
///
/// Field/header precedence: the `X-Device-Id` header wins over the `device`
/// part; the `frame_index` part wins over the `X-Frame-Index` header. The
/// device gets an empty 204 back — it never needs a payload echoed.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ServerError> {
    let mut image: Option<Vec<u8>> = None;
    let mut device_field = None;
    let mut capture_ts = None;
    let mut sent_ts = None;
    let mut side = None;
    let mut frame_index_field = None;
    let mut overlay_field = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match name.as_str() {
            "image" => image = Some(field.bytes().await.map_err(bad_multipart)?.to_vec()),
            "device" => device_field = Some(field.text().await.map_err(bad_multipart)?),
            "ts" => capture_ts = Some(field.text().await.map_err(bad_multipart)?),
            "sent_ts" => sent_ts = Some(field.text().await.map_err(bad_multipart)?),
            "side" => side = Some(field.text().await.map_err(bad_multipart)?),
            "frame_index" => frame_index_field = Some(field.text().await.map_err(bad_multipart)?),
            "overlay" => overlay_field = Some(field.text().await.map_err(bad_multipart)?),
            _ => {}
        }
    }

    let image = image.ok_or_else(|| ServerError::BadRequest("no image".into()))?;

    let device_id = header_str(&headers, "x-device-id").or(device_field);
    let frame_index = frame_index_field
        .or_else(|| header_str(&headers, "x-frame-index"))
        .and_then(|v| v.trim().parse::<u64>().ok());
    let overlay = overlay_field
        .or_else(|| header_str(&headers, "x-overlay"))
        .map(|v| is_truthy(&v))
        .unwrap_or(false);

    let request = IngestRequest {
        device_id,
        capture_ts,
        sent_ts,
        side,
        frame_index,
        overlay,
    };
    state.inner.store.ingest(request, image).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// POST /delete — remove one archival frame by name.
///
/// Latest pointers are refused (403); a missing file is a silent no-op.
pub async fn delete(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ServerError> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() == Some("file") {
            file = Some(field.text().await.map_err(bad_multipart)?);
        }
    }

    let name = file
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ServerError::BadRequest("no file".into()))?;

    state.inner.store.delete(name).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
