//! Read-only catalog queries over the upload directory.
//!
//! Recency is derived from filesystem modification times — archival files
//! are immutable once published, so mtime is the write time. These scans are
//! synchronous; callers on the async side wrap them in `spawn_blocking`.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::naming;

/// Hard cap on `list_recent` regardless of the caller's limit.
pub const MAX_RECENT: usize = 1000;
/// Page size clamp range for paginated and grouped listings.
pub const MIN_PAGE_SIZE: usize = 1;
pub const MAX_PAGE_SIZE: usize = 200;

/// One archival frame as observed on disk.
#[derive(Debug, Clone)]
pub struct FrameEntry {
    pub name: String,
    pub modified: SystemTime,
    pub size: u64,
}

impl FrameEntry {
    pub fn device(&self) -> &str {
        naming::device_from_name(&self.name)
    }

    /// Modification time as unix seconds, for JSON output.
    pub fn mtime_seconds(&self) -> f64 {
        self.modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// One page of a paginated catalog listing.
#[derive(Debug)]
pub struct Page {
    pub items: Vec<FrameEntry>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

/// All archival frames, most recent first. Latest pointers and non-image
/// files are excluded; entries that vanish mid-scan are skipped.
pub fn scan_sorted(dir: &Path) -> io::Result<Vec<FrameEntry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        if !naming::is_frame_name(&name) {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(_) => continue, // raced with a delete
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(UNIX_EPOCH);
        entries.push(FrameEntry {
            name,
            modified,
            size: meta.len(),
        });
    }
    // Name tie-break keeps the order stable when mtimes collide.
    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
    Ok(entries)
}

/// The most recent frames, truncated to `limit` (capped at [`MAX_RECENT`]).
pub fn list_recent(dir: &Path, limit: usize) -> io::Result<Vec<FrameEntry>> {
    let mut entries = scan_sorted(dir)?;
    entries.truncate(limit.min(MAX_RECENT));
    Ok(entries)
}

/// Paginated listing with an optional exact-match device filter.
///
/// `page` is 1-indexed and clamped to ≥ 1; `size` is clamped to
/// [`MIN_PAGE_SIZE`]..=[`MAX_PAGE_SIZE`]; `total` counts the filtered set.
pub fn list_paginated(
    dir: &Path,
    device: Option<&str>,
    page: usize,
    size: usize,
) -> io::Result<Page> {
    let page = page.max(1);
    let size = size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);

    let mut entries = scan_sorted(dir)?;
    if let Some(device) = device {
        entries.retain(|e| e.device() == device);
    }

    let total = entries.len();
    let start = (page - 1).saturating_mul(size);
    let has_next = start.saturating_add(size) < total;
    let items: Vec<FrameEntry> = entries.into_iter().skip(start).take(size).collect();

    Ok(Page {
        items,
        total,
        page,
        size,
        has_prev: page > 1,
        has_next,
    })
}

/// The most recent `per_device` frames for every device, devices in
/// lexicographic order.
pub fn list_grouped_by_device(
    dir: &Path,
    per_device: usize,
) -> io::Result<Vec<(String, Vec<FrameEntry>)>> {
    let per_device = per_device.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
    let mut groups: BTreeMap<String, Vec<FrameEntry>> = BTreeMap::new();
    for entry in scan_sorted(dir)? {
        let bucket = groups.entry(entry.device().to_string()).or_default();
        if bucket.len() < per_device {
            bucket.push(entry);
        }
    }
    Ok(groups.into_iter().collect())
}

/// Every device id present in the archive, sorted.
pub fn distinct_devices(dir: &Path) -> io::Result<Vec<String>> {
    let mut devices: Vec<String> = scan_sorted(dir)?
        .iter()
        .map(|e| e.device().to_string())
        .collect();
    devices.sort();
    devices.dedup();
    Ok(devices)
}
