// src/registry/entry.rs

use tokio::task::AbortHandle;
use tracing::debug;

use crate::types::{ArtifactState, EntrySnapshot, ModuleSource, SharedArtifact};
use crate::watch::WatchHandle;

/// Per-name registry record.
///
/// The watch handle and the pending debounce timer are owned exclusively
/// by the entry; `teardown` cancels both and runs again from `Drop`, so an
/// entry can never leak a live watcher or timer.
#[derive(Debug)]
pub(crate) struct Entry {
    pub name: String,
    pub source: ModuleSource,
    pub artifact: ArtifactState,
    pub watch: Option<Box<dyn WatchHandle>>,
    pub pending: Option<AbortHandle>,
    /// Validity token captured by watcher sinks and timer callbacks at
    /// scheduling time; a mismatch means the callback is stale.
    pub generation: u64,
}

impl Entry {
    pub fn new(
        name: String,
        source: ModuleSource,
        artifact: SharedArtifact,
        watch: Option<Box<dyn WatchHandle>>,
        generation: u64,
    ) -> Self {
        Self {
            name,
            source,
            artifact: ArtifactState::Loaded(artifact),
            watch,
            pending: None,
            generation,
        }
    }

    /// Cancel the pending timer and close the watch subscription.
    /// Idempotent.
    pub fn teardown(&mut self) {
        if let Some(timer) = self.pending.take() {
            debug!(name = %self.name, "cancelling pending reload timer");
            timer.abort();
        }
        if let Some(mut watch) = self.watch.take() {
            watch.close();
        }
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            name: self.name.clone(),
            source_path: self.source.watched_path().to_path_buf(),
            package: self.source.package_id().map(str::to_string),
            artifact: self.artifact.loaded().cloned(),
        }
    }
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.teardown();
    }
}
