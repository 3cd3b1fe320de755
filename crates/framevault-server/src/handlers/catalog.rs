use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use framevault_core::catalog::{self, FrameEntry};
use tokio_util::io::ReaderStream;

use crate::error::ServerError;
use crate::state::AppState;

const DEFAULT_RECENT_LIMIT: usize = 100;
const DEFAULT_PAGE_SIZE: usize = 50;
const DEFAULT_SPLIT_COUNT: usize = 30;

/// Pagination parameters arrive as strings so malformed values fall back to
/// defaults instead of rejecting the request.
fn parse_or<T: std::str::FromStr>(raw: &Option<String>, default: T) -> T {
    raw.as_deref()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn entry_json(entry: &FrameEntry) -> serde_json::Value {
    serde_json::json!({
        "file": entry.name,
        "url": format!("/uploads/{}", entry.name),
        "mtime": entry.mtime_seconds(),
    })
}

#[derive(serde::Deserialize, Default)]
pub struct RecentQuery {
    pub limit: Option<String>,
}

/// GET /api/recent — most recent frames, newest first.
pub async fn recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Response, ServerError> {
    let limit = parse_or(&query.limit, DEFAULT_RECENT_LIMIT);
    let dir = state.inner.store.dir().to_path_buf();

    let entries = tokio::task::spawn_blocking(move || catalog::list_recent(&dir, limit))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    let items: Vec<serde_json::Value> = entries.iter().map(entry_json).collect();
    Ok(axum::Json(items).into_response())
}

#[derive(serde::Deserialize, Default)]
pub struct GalleryQuery {
    pub device: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
}

/// GET /api/gallery — paginated catalog with an optional device filter.
pub async fn gallery(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> Result<Response, ServerError> {
    let device = query
        .device
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let page = parse_or(&query.page, 1);
    let size = parse_or(&query.size, DEFAULT_PAGE_SIZE);
    let dir = state.inner.store.dir().to_path_buf();

    let filter = device.clone();
    let (page_data, devices) = tokio::task::spawn_blocking(move || {
        let filter = (!filter.is_empty()).then_some(filter.as_str());
        let page_data = catalog::list_paginated(&dir, filter, page, size)?;
        let devices = catalog::distinct_devices(&dir)?;
        Ok::<_, std::io::Error>((page_data, devices))
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    let items: Vec<serde_json::Value> = page_data
        .items
        .iter()
        .map(|e| {
            let mut item = entry_json(e);
            item["device"] = serde_json::json!(e.device());
            item
        })
        .collect();

    Ok(axum::Json(serde_json::json!({
        "items": items,
        "page": page_data.page,
        "size": page_data.size,
        "total": page_data.total,
        "has_prev": page_data.has_prev,
        "has_next": page_data.has_next,
        "device": device,
        "devices": devices,
    }))
    .into_response())
}

#[derive(serde::Deserialize, Default)]
pub struct SplitQuery {
    pub n: Option<String>,
}

/// GET /api/gallery/split — the most recent `n` frames per device.
pub async fn gallery_split(
    State(state): State<AppState>,
    Query(query): Query<SplitQuery>,
) -> Result<Response, ServerError> {
    let n = parse_or(&query.n, DEFAULT_SPLIT_COUNT)
        .clamp(catalog::MIN_PAGE_SIZE, catalog::MAX_PAGE_SIZE);
    let dir = state.inner.store.dir().to_path_buf();

    let groups = tokio::task::spawn_blocking(move || catalog::list_grouped_by_device(&dir, n))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    let groups: Vec<serde_json::Value> = groups
        .iter()
        .map(|(device, entries)| {
            serde_json::json!({
                "device": device,
                "files": entries.iter().map(entry_json).collect::<Vec<_>>(),
            })
        })
        .collect();

    Ok(axum::Json(serde_json::json!({ "n": n, "groups": groups })).into_response())
}

/// GET /api/devices — every device id present in the archive.
pub async fn devices(State(state): State<AppState>) -> Result<Response, ServerError> {
    let dir = state.inner.store.dir().to_path_buf();
    let devices = tokio::task::spawn_blocking(move || catalog::distinct_devices(&dir))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;
    Ok(axum::Json(devices).into_response())
}

/// GET /uploads/{name} — raw stored bytes (archival frames and pointers).
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ServerError> {
    let file_path = state
        .inner
        .store
        .file_path(&name)
        .ok_or_else(|| ServerError::BadRequest("invalid file name".into()))?;

    let file = match tokio::fs::File::open(&file_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ServerError::NotFound(name));
        }
        Err(e) => return Err(ServerError::from(e)),
    };

    let file_len = file.metadata().await.map_err(ServerError::from)?.len();
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/jpeg".to_string()),
            (header::CONTENT_LENGTH, file_len.to_string()),
        ],
        body,
    )
        .into_response())
}

/// GET /api/log — full metadata log contents.
pub async fn frame_log(State(state): State<AppState>) -> Result<Response, ServerError> {
    let Some(log) = state.inner.store.frame_log().cloned() else {
        return Err(ServerError::NotFound("frame log not enabled".into()));
    };

    let records = tokio::task::spawn_blocking(move || log.read_all())
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(axum::Json(records).into_response())
}

/// GET /api/stats — archive summary.
pub async fn stats(State(state): State<AppState>) -> Result<Response, ServerError> {
    let dir = state.inner.store.dir().to_path_buf();

    let (frames, devices, total_bytes) = tokio::task::spawn_blocking(move || {
        let entries = catalog::scan_sorted(&dir)?;
        let mut devices: Vec<&str> = entries.iter().map(FrameEntry::device).collect();
        devices.sort_unstable();
        devices.dedup();
        let total_bytes: u64 = entries.iter().map(|e| e.size).sum();
        Ok::<_, std::io::Error>((entries.len(), devices.len(), total_bytes))
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(axum::Json(serde_json::json!({
        "frames": frames,
        "devices": devices,
        "total_bytes": total_bytes,
        "max_keep": state.inner.store.max_keep(),
        "uptime_seconds": state.inner.start_time.elapsed().as_secs(),
    }))
    .into_response())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use framevault_core::catalog;

    use super::super::test_helpers::*;

    async fn upload_frame(router: axum::Router, device: &str, marker: &str) {
        let body = multipart_body(&[], Some(marker.as_bytes()));
        let resp = post_multipart(
            router,
            "/upload",
            Some(TEST_TOKEN),
            &[("X-Device-Id", device)],
            body,
        )
        .await;
        assert_status(&resp, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn recent_lists_new_frame_with_url_and_mtime() {
        let (router, _state, _tmp) = setup_app(10).await;
        upload_frame(router.clone(), "cam-a", "payload").await;

        let resp = get(router, "/api/recent", None).await;
        assert_status(&resp, StatusCode::OK);
        let items: Vec<serde_json::Value> =
            serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(items.len(), 1);

        let file = items[0]["file"].as_str().unwrap();
        assert!(file.starts_with("cam-a_"));
        assert_eq!(items[0]["url"].as_str().unwrap(), format!("/uploads/{file}"));
        assert!(items[0]["mtime"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn gallery_pages_and_filters() {
        let (router, _state, _tmp) = setup_app(50).await;
        for i in 0..3 {
            upload_frame(router.clone(), "cam-a", &format!("a{i}")).await;
        }
        upload_frame(router.clone(), "cam-b", "b0").await;

        let resp = get(router.clone(), "/api/gallery?page=1&size=2", None).await;
        assert_status(&resp, StatusCode::OK);
        let page: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(page["total"].as_u64(), Some(4));
        assert_eq!(page["items"].as_array().unwrap().len(), 2);
        assert_eq!(page["has_prev"].as_bool(), Some(false));
        assert_eq!(page["has_next"].as_bool(), Some(true));
        assert_eq!(
            page["devices"].as_array().unwrap().len(),
            2,
            "both devices listed"
        );

        let resp = get(router.clone(), "/api/gallery?device=cam-a", None).await;
        let page: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(page["total"].as_u64(), Some(3));
        assert_eq!(page["device"].as_str(), Some("cam-a"));

        let resp = get(router, "/api/gallery?page=3&size=2", None).await;
        let page: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert!(page["items"].as_array().unwrap().is_empty());
        assert_eq!(page["has_next"].as_bool(), Some(false));
    }

    #[tokio::test]
    async fn gallery_clamps_malformed_params() {
        let (router, _state, _tmp) = setup_app(10).await;
        upload_frame(router.clone(), "cam-a", "x").await;

        let resp = get(router, "/api/gallery?page=abc&size=zzz", None).await;
        assert_status(&resp, StatusCode::OK);
        let page: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(page["page"].as_u64(), Some(1));
        assert_eq!(page["size"].as_u64(), Some(50));
    }

    #[tokio::test]
    async fn split_groups_by_device_in_order() {
        let (router, _state, _tmp) = setup_app(50).await;
        upload_frame(router.clone(), "cam-b", "b0").await;
        upload_frame(router.clone(), "cam-a", "a0").await;
        upload_frame(router.clone(), "cam-a", "a1").await;

        let resp = get(router, "/api/gallery/split?n=1", None).await;
        assert_status(&resp, StatusCode::OK);
        let split: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        let groups = split["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["device"].as_str(), Some("cam-a"));
        assert_eq!(groups[1]["device"].as_str(), Some("cam-b"));
        assert_eq!(groups[0]["files"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn devices_endpoint_lists_distinct_ids() {
        let (router, _state, _tmp) = setup_app(10).await;
        upload_frame(router.clone(), "cam-b", "b").await;
        upload_frame(router.clone(), "cam-a", "a").await;

        let resp = get(router, "/api/devices", None).await;
        let devices: Vec<String> = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(devices, vec!["cam-a".to_string(), "cam-b".to_string()]);
    }

    #[tokio::test]
    async fn serve_upload_returns_stored_bytes() {
        let (router, state, _tmp) = setup_app(10).await;
        upload_frame(router.clone(), "cam-a", "exact-bytes").await;

        let name = catalog::scan_sorted(state.inner.store.dir()).unwrap()[0]
            .name
            .clone();
        let resp = get(router.clone(), &format!("/uploads/{name}"), None).await;
        assert_status(&resp, StatusCode::OK);
        assert_eq!(body_bytes(resp).await, b"exact-bytes");

        // latest pointers are also servable
        let resp = get(router, "/uploads/latest_all.jpg", None).await;
        assert_status(&resp, StatusCode::OK);
    }

    #[tokio::test]
    async fn serve_upload_missing_is_404() {
        let (router, _state, _tmp) = setup_app(10).await;
        let resp = get(router, "/uploads/cam-a_gone_00000000.jpg", None).await;
        assert_status(&resp, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn log_endpoint_requires_enabled_log() {
        let (router, _state, _tmp) = setup_app(10).await;
        let resp = get(router, "/api/log", Some(TEST_TOKEN)).await;
        assert_status(&resp, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn log_endpoint_returns_appended_rows() {
        let (router, _state, _tmp) = setup_app_with(10, true, TEST_TOKEN).await;

        let body = multipart_body(
            &[("side", "left"), ("frame_index", "4")],
            Some(b"jpeg-bytes"),
        );
        let resp = post_multipart(
            router.clone(),
            "/upload",
            Some(TEST_TOKEN),
            &[("X-Device-Id", "cam-a")],
            body,
        )
        .await;
        assert_status(&resp, StatusCode::NO_CONTENT);

        let resp = get(router, "/api/log", Some(TEST_TOKEN)).await;
        assert_status(&resp, StatusCode::OK);
        let rows: Vec<serde_json::Value> = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["device_id"].as_str(), Some("cam-a"));
        assert_eq!(rows[0]["side"].as_str(), Some("left"));
        assert_eq!(rows[0]["frame_index"].as_u64(), Some(4));
    }

    #[tokio::test]
    async fn stats_reports_counts() {
        let (router, _state, _tmp) = setup_app(10).await;
        upload_frame(router.clone(), "cam-a", "12345678").await;
        upload_frame(router.clone(), "cam-b", "12345678").await;

        let resp = get(router, "/api/stats", Some(TEST_TOKEN)).await;
        assert_status(&resp, StatusCode::OK);
        let stats: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(stats["frames"].as_u64(), Some(2));
        assert_eq!(stats["devices"].as_u64(), Some(2));
        assert_eq!(stats["total_bytes"].as_u64(), Some(16));
        assert_eq!(stats["max_keep"].as_u64(), Some(10));
    }
}
