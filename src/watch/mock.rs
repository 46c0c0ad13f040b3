// src/watch/mock.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{ChangeKind, ChangeSink, FileChange, WatchBackend, WatchError, WatchHandle};

/// Test backend: subscriptions are recorded, and tests deliver synthetic
/// change notifications with [`MockBackend::fire`]. A closed handle stops
/// delivery for its subscription but keeps it visible to assertions.
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<Vec<MockSubscription>>>,
}

struct MockSubscription {
    path: PathBuf,
    sink: ChangeSink,
    closed: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a change to every live subscription watching `path`.
    /// Returns how many sinks were invoked.
    pub fn fire(&self, path: &Path, kind: ChangeKind) -> usize {
        let subs = self.lock();
        let mut delivered = 0;
        for sub in subs.iter() {
            if sub.path == path && !sub.closed.load(Ordering::SeqCst) {
                (sub.sink)(FileChange {
                    path: path.to_path_buf(),
                    kind,
                });
                delivered += 1;
            }
        }
        delivered
    }

    /// Paths of all subscriptions ever made, in subscription order.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.lock().iter().map(|s| s.path.clone()).collect()
    }

    /// Number of subscriptions that have not been closed.
    pub fn live_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|s| !s.closed.load(Ordering::SeqCst))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MockSubscription>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBackend")
            .field("subscriptions", &self.lock().len())
            .finish()
    }
}

#[derive(Debug)]
pub struct MockHandle {
    path: PathBuf,
    closed: Arc<AtomicBool>,
}

impl WatchHandle for MockHandle {
    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl WatchBackend for MockBackend {
    fn subscribe(
        &self,
        path: &Path,
        sink: ChangeSink,
    ) -> Result<Box<dyn WatchHandle>, WatchError> {
        let closed = Arc::new(AtomicBool::new(false));
        self.lock().push(MockSubscription {
            path: path.to_path_buf(),
            sink,
            closed: Arc::clone(&closed),
        });
        Ok(Box::new(MockHandle {
            path: path.to_path_buf(),
            closed,
        }))
    }
}
