// src/watch/notify_backend.rs

use std::fmt;
use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use super::{ChangeKind, ChangeSink, FileChange, WatchBackend, WatchError, WatchHandle};

/// Production backend on top of `notify`.
///
/// Each subscription owns its own `RecommendedWatcher`, watching exactly
/// one file non-recursively. The platform callback runs on notify's own
/// thread; it forwards straight into the sink, which is expected to be a
/// cheap channel send.
#[derive(Debug, Clone, Default)]
pub struct NotifyBackend;

impl NotifyBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Keeps the underlying watcher alive; dropping or closing stops delivery.
pub struct NotifySubscription {
    watcher: Option<RecommendedWatcher>,
    path: PathBuf,
}

impl fmt::Debug for NotifySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifySubscription")
            .field("path", &self.path)
            .field("active", &self.watcher.is_some())
            .finish()
    }
}

impl WatchHandle for NotifySubscription {
    fn close(&mut self) {
        if self.watcher.take().is_some() {
            debug!(path = ?self.path, "closed watch subscription");
        }
    }
}

fn classify(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(_) => ChangeKind::Content,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            ChangeKind::Content
        }
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => ChangeKind::Other,
    }
}

impl WatchBackend for NotifyBackend {
    fn subscribe(
        &self,
        path: &Path,
        sink: ChangeSink,
    ) -> Result<Box<dyn WatchHandle>, WatchError> {
        let watched = path.to_path_buf();
        let callback_path = watched.clone();

        // Closure called synchronously by notify whenever an event arrives.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let kind = classify(&event.kind);
                    sink(FileChange {
                        path: callback_path.clone(),
                        kind,
                    });
                }
                Err(err) => {
                    // We can't log via tracing here easily, so fallback to stderr.
                    eprintln!("modreg: file watch error on {callback_path:?}: {err}");
                }
            },
            Config::default(),
        )
        .map_err(|err| WatchError::Subscribe {
            path: watched.clone(),
            source: err.into(),
        })?;

        watcher
            .watch(&watched, RecursiveMode::NonRecursive)
            .map_err(|err| WatchError::Subscribe {
                path: watched.clone(),
                source: err.into(),
            })?;

        debug!(path = ?watched, "watch subscription started");

        Ok(Box::new(NotifySubscription {
            watcher: Some(watcher),
            path: watched,
        }))
    }
}
