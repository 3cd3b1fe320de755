//! Ingestion, retention, and catalog core for the framevault frame archive.
//!
//! A [`store::FrameStore`] owns one upload directory. Inbound frames get a
//! collision-free name, are published atomically alongside the mutable
//! `latest_*` pointer files, optionally logged to an append-only CSV sidecar,
//! and pruned oldest-first once the retention cap is exceeded. The catalog
//! functions in [`catalog`] answer listing queries from the same directory
//! and never observe pointer files as archive entries.

pub mod atomic;
pub mod catalog;
pub mod error;
pub mod framelog;
pub mod naming;
pub mod overlay;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{FrameStore, IngestRequest, IngestedFrame};
