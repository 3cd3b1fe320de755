//! The ingestion orchestrator and retention pruner.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::error::{Result, StoreError};
use crate::framelog::{FrameLog, LogRecord};
use crate::{atomic, catalog, naming, overlay};

/// Upload parameters accompanying the raw image bytes.
#[derive(Debug, Default, Clone)]
pub struct IngestRequest {
    pub device_id: Option<String>,
    /// Device-reported capture timestamp; server-assigned when absent.
    pub capture_ts: Option<String>,
    /// Device-reported send timestamp, recorded in the metadata log only.
    pub sent_ts: Option<String>,
    /// Side label in multi-camera setups, recorded in the metadata log only.
    pub side: Option<String>,
    pub frame_index: Option<u64>,
    /// Burn the `f<frame_index>` label into the stored bytes (best-effort).
    pub overlay: bool,
}

/// The identity assigned to a successfully archived frame.
#[derive(Debug, Clone)]
pub struct IngestedFrame {
    pub name: String,
    pub device_id: String,
    pub timestamp: String,
    pub frame_index: Option<u64>,
    pub correlation_id: String,
}

/// Owns the upload directory and every mutation of it: archival writes,
/// latest-pointer refreshes, metadata log appends, retention pruning, and
/// deletes. Catalog reads go through [`crate::catalog`] on the same
/// directory.
pub struct FrameStore {
    dir: PathBuf,
    max_keep: usize,
    frame_log: Option<Arc<FrameLog>>,
}

impl FrameStore {
    pub fn new(dir: impl Into<PathBuf>, max_keep: usize) -> Self {
        Self {
            dir: dir.into(),
            max_keep,
            frame_log: None,
        }
    }

    /// Attach the append-only metadata log.
    pub fn with_frame_log(mut self, log: FrameLog) -> Self {
        self.frame_log = Some(Arc::new(log));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_keep(&self) -> usize {
        self.max_keep
    }

    pub fn frame_log(&self) -> Option<&Arc<FrameLog>> {
        self.frame_log.as_ref()
    }

    /// Create the upload directory if missing.
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Archive one inbound frame.
    ///
    /// The archival write is the only fatal step. Overlay, pointer refresh,
    /// log append, and pruning are all best-effort: failures are logged and
    /// the frame still counts as ingested, because the archival copy is
    /// authoritative.
    pub async fn ingest(&self, req: IngestRequest, bytes: Vec<u8>) -> Result<IngestedFrame> {
        if bytes.is_empty() {
            return Err(StoreError::EmptyPayload);
        }

        let received_at = now_iso_millis();
        let device_id = naming::sanitize_device(req.device_id.as_deref().unwrap_or(""));
        let capture_ts = match req.capture_ts {
            Some(ts) if !ts.trim().is_empty() => ts,
            _ => received_at.clone(),
        };
        let correlation_id = naming::disambiguator();
        let name = naming::frame_name(&device_id, &capture_ts, req.frame_index, &correlation_id);

        let bytes = match (req.overlay, req.frame_index) {
            (true, Some(idx)) => match overlay::burn_index(&bytes, idx) {
                Ok(stamped) => stamped,
                Err(e) => {
                    warn!(error = %e, "frame index overlay failed; storing original bytes");
                    bytes
                }
            },
            _ => bytes,
        };

        atomic::write_atomic(&self.dir.join(&name), &bytes).await?;

        // Pointer refreshes race harmlessly: the rename is atomic and the
        // last completed write wins.
        for pointer in [
            naming::latest_name_for(None),
            naming::latest_name_for(Some(&device_id)),
        ] {
            if let Err(e) = atomic::write_atomic(&self.dir.join(&pointer), &bytes).await {
                warn!(pointer = %pointer, error = %e, "latest pointer refresh failed");
            }
        }

        if let Some(log) = &self.frame_log {
            let record = LogRecord {
                received_at,
                device_id: device_id.clone(),
                side: req.side.unwrap_or_default(),
                frame_index: req.frame_index,
                capture_ts: capture_ts.clone(),
                sent_ts: req.sent_ts.unwrap_or_default(),
                correlation_id: correlation_id.clone(),
                path: name.clone(),
            };
            if let Err(e) = log.append(&record).await {
                warn!(error = %e, "frame log append failed");
            }
        }

        if let Err(e) = self.prune().await {
            warn!(error = %e, "retention prune failed");
        }

        Ok(IngestedFrame {
            name,
            device_id,
            timestamp: capture_ts,
            frame_index: req.frame_index,
            correlation_id,
        })
    }

    /// Delete archival frames beyond `max_keep`, oldest first. Latest
    /// pointers are never candidates. Returns the number evicted.
    pub async fn prune(&self) -> Result<usize> {
        let dir = self.dir.clone();
        let entries = tokio::task::spawn_blocking(move || catalog::scan_sorted(&dir))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;

        let mut evicted = 0;
        for entry in entries.iter().skip(self.max_keep) {
            match tokio::fs::remove_file(self.dir.join(&entry.name)).await {
                Ok(()) => evicted += 1,
                // raced with a concurrent manual delete
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(evicted)
    }

    /// Delete one archival frame by name. Latest-pointer names are refused;
    /// `Ok(false)` means the file was already gone.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let name = valid_file_name(name)?;
        if naming::is_latest_name(name) {
            return Err(StoreError::ProtectedName(name.to_string()));
        }
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a stored file (archival frame or latest pointer) for serving.
    /// `None` when the name is not a bare file name.
    pub fn file_path(&self, name: &str) -> Option<PathBuf> {
        valid_file_name(name).ok().map(|name| self.dir.join(name))
    }
}

/// Reject anything that is not a single path component.
fn valid_file_name(name: &str) -> Result<&str> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Current UTC time in the fixed millisecond-ISO format used for
/// server-assigned timestamps.
pub fn now_iso_millis() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
