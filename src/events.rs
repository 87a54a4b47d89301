//! Cooperative cancellation and the core event stream (spec.md section 6
//! "Exposed" interface), shared by the extractor and the execution engine.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// A cooperative cancellation flag. Checked between files/operations, never
/// mid-syscall, per spec.md section 5.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Progress/state-change events emitted by the extractor and execution
/// engine, decoupling the core from any particular UI.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    RowChanged(PathBuf),
    ExtractionProgress { completed: usize, total: usize },
    ExecutionProgress { completed: usize, total: usize },
    BatchCompleted(u64),
    /// A tier-2 cache operation failed and the cache degraded to tier-1-only
    /// for that call.
    CacheTier2Degraded(String),
}

/// Creates a sender/receiver pair for [`CoreEvent`]s. The receiver is handed
/// to the caller (CLI harness, UI); the sender is cloned into whichever
/// component needs to publish events.
pub fn event_stream() -> (Sender<CoreEvent>, Receiver<CoreEvent>) {
    mpsc::channel()
}
