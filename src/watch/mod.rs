// src/watch/mod.rs

//! The filesystem change-notification capability consumed by the registry.
//!
//! A [`WatchBackend`] turns one path into a stream of [`FileChange`]s
//! delivered through a sink callback, until the returned handle is closed.
//! The backend does **not** debounce and does not know about entries; it
//! only reports what the platform reports. Debouncing and staleness checks
//! live in the registry's reload pipeline.
//!
//! Production code uses [`NotifyBackend`]; tests can use [`MockBackend`].

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod mock;
pub mod notify_backend;

pub use mock::MockBackend;
pub use notify_backend::NotifyBackend;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("cannot watch {path:?}")]
    Subscribe {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// What kind of change a notification describes.
///
/// Only `Content` arms the reload pipeline; removals and metadata-level
/// noise are observed but never trigger a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File content was written or the file was (re)created.
    Content,
    /// The file was removed.
    Removed,
    /// Anything else (metadata, access, renames).
    Other,
}

/// A single change notification for a watched path.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Callback invoked by a backend for every notification.
pub type ChangeSink = Box<dyn Fn(FileChange) + Send + Sync>;

/// Owned handle to an active subscription. Closing stops delivery; close
/// must be safe to call multiple times.
pub trait WatchHandle: Send + Debug {
    fn close(&mut self);
}

/// Abstract change-notification backend.
pub trait WatchBackend: Send + Sync + Debug {
    fn subscribe(
        &self,
        path: &Path,
        sink: ChangeSink,
    ) -> Result<Box<dyn WatchHandle>, WatchError>;
}
