//! Append-only CSV metadata log, one row per ingested frame.
//!
//! The log has its own lifecycle: rows describe frames but are never rewritten
//! or deleted, even after the frame itself is pruned. Each append is a single
//! `write_all` in append mode, serialized behind a mutex, so concurrent rows
//! never interleave. Control characters in field values are flattened to
//! spaces so one record is always exactly one line.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::atomic;
use crate::error::Result;

pub const LOG_HEADER: &str =
    "received_at,device_id,side,frame_index,capture_ts,sent_ts,correlation_id,path";

/// One metadata row describing a single ingested frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Server receive time, millisecond-ISO UTC.
    pub received_at: String,
    pub device_id: String,
    /// Side label in multi-camera setups; empty when not supplied.
    pub side: String,
    pub frame_index: Option<u64>,
    /// Device-reported capture timestamp, verbatim.
    pub capture_ts: String,
    /// Device-reported send timestamp, verbatim; empty when not supplied.
    pub sent_ts: String,
    pub correlation_id: String,
    /// Storage path of the archival file, relative to the upload directory.
    pub path: String,
}

pub struct FrameLog {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl FrameLog {
    /// Open the log, creating it with the fixed header when absent.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match tokio::fs::metadata(&path).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                atomic::write_atomic(&path, format!("{LOG_HEADER}\n").as_bytes()).await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Self {
            path,
            append_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as an indivisible row.
    pub async fn append(&self, record: &LogRecord) -> Result<()> {
        let line = encode_row(record);
        let _guard = self.append_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read every record back, skipping the header and malformed rows.
    pub fn read_all(&self) -> Result<Vec<LogRecord>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for (idx, line) in io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.is_empty() || (idx == 0 && line == LOG_HEADER) {
                continue;
            }
            match decode_row(&line) {
                Some(record) => records.push(record),
                None => tracing::warn!(line = idx + 1, "skipping malformed frame log row"),
            }
        }
        Ok(records)
    }
}

/// Quote a field if it contains a comma or a quote; flatten control chars.
fn csv_field(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if cleaned.contains(',') || cleaned.contains('"') {
        format!("\"{}\"", cleaned.replace('"', "\"\""))
    } else {
        cleaned
    }
}

fn encode_row(r: &LogRecord) -> String {
    let frame_index = r.frame_index.map(|i| i.to_string()).unwrap_or_default();
    format!(
        "{},{},{},{},{},{},{},{}\n",
        csv_field(&r.received_at),
        csv_field(&r.device_id),
        csv_field(&r.side),
        frame_index,
        csv_field(&r.capture_ts),
        csv_field(&r.sent_ts),
        csv_field(&r.correlation_id),
        csv_field(&r.path),
    )
}

fn decode_row(line: &str) -> Option<LogRecord> {
    let fields = split_row(line);
    if fields.len() != 8 {
        return None;
    }
    let mut fields = fields.into_iter();
    let received_at = fields.next()?;
    let device_id = fields.next()?;
    let side = fields.next()?;
    let frame_index = match fields.next()?.as_str() {
        "" => None,
        raw => Some(raw.parse().ok()?),
    };
    Some(LogRecord {
        received_at,
        device_id,
        side,
        frame_index,
        capture_ts: fields.next()?,
        sent_ts: fields.next()?,
        correlation_id: fields.next()?,
        path: fields.next()?,
    })
}

/// Split one CSV line into unquoted field values.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}
