//! Atomic publication of file contents.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use tokio::io::AsyncWriteExt;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `bytes` to `dst` so a concurrent reader observes either the old or
/// the new content, never a partial file.
///
/// The temp file lives in the target's directory so the final rename stays on
/// one filesystem. Data is flushed and fsynced before the rename; the rename
/// itself is the only externally visible mutation.
pub async fn write_atomic(dst: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let unique_id = TEMP_COUNTER.fetch_add(1, Relaxed);
    let file_name = dst.file_name().unwrap_or_default().to_string_lossy();
    let temp_path = dst.with_file_name(format!(".tmp.{file_name}.{unique_id}"));

    // Scope the handle so it is closed before the rename (required on Windows).
    let write_result = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok::<_, std::io::Error>(())
    }
    .await;

    if let Err(e) = write_result {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    if let Err(e) = tokio::fs::rename(&temp_path, dst).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }
    Ok(())
}
