use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use framevault_core::FrameStore;

use crate::config::ServerSection;

/// Shared application state, wrapped in Arc for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub config: ServerSection,
    pub store: FrameStore,
    pub control: ControlQueue,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: ServerSection, store: FrameStore) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                control: ControlQueue::default(),
                start_time: std::time::Instant::now(),
            }),
        }
    }
}

/// One queued capture command awaiting a device poll.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ControlCommand {
    pub cmd: String,
    /// Enqueue time, unix seconds.
    pub ts: f64,
}

/// In-memory START/STOP FIFO, mutated only through these methods. Bounded so
/// an unpolled server cannot grow it without limit.
pub struct ControlQueue {
    items: Mutex<VecDeque<ControlCommand>>,
}

const CONTROL_QUEUE_CAP: usize = 256;

impl Default for ControlQueue {
    fn default() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }
}

impl ControlQueue {
    pub fn push(&self, cmd: String) {
        let mut items = lock_unpoisoned(&self.items, "control");
        if items.len() == CONTROL_QUEUE_CAP {
            items.pop_front();
        }
        items.push_back(ControlCommand {
            cmd,
            ts: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        });
    }

    pub fn pop(&self) -> Option<ControlCommand> {
        lock_unpoisoned(&self.items, "control").pop_front()
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.items, "control").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_unpoisoned<'a, T>(lock: &'a Mutex<T>, lock_name: &'static str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(lock = lock_name, "mutex poisoned; continuing with inner state");
            poisoned.into_inner()
        }
    }
}
