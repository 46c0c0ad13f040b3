// src/registry/pipeline.rs

//! Debounce/reload pipeline.
//!
//! Raw watch notifications are forwarded by the per-entry watcher sinks
//! into one unbounded channel; a single spawned task consumes them and
//! drives a two-state machine per entry:
//!
//! - `Idle → PendingReload`: the first content change arms a one-shot
//!   timer for the configured delay. Further changes while the timer is
//!   armed are coalesced; the timer is neither reset nor duplicated.
//! - `PendingReload → Idle`: on expiry, re-resolve (drop the loader's
//!   cached state for the source), re-load, install the new artifact and
//!   emit `Reload`.
//!
//! Only `ChangeKind::Content` notifications arm the timer; removals and
//! metadata noise are logged and dropped.
//!
//! Every sink and timer callback carries the entry generation it was
//! scheduled under. Unregister and destroy cancel timers and close
//! watchers, but close is not guaranteed instantaneous on every platform,
//! so each callback re-validates the generation and the destroyed flag
//! before touching anything. The load itself runs with the state lock
//! released; readers keep observing the previous artifact until the new
//! one is installed, and installation re-validates the generation once
//! more.
//!
//! A failed scheduled reload keeps the last good artifact and emits
//! `ReloadFailed`; the next change notification arms a fresh timer.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::errors::{RegistryError, Result};
use crate::events::RegistryEvent;
use crate::loader::LoaderError;
use crate::types::{ArtifactState, ModuleSource, SharedArtifact};
use crate::watch::ChangeKind;

use super::RegistryInner;

/// Message from a watcher sink (or destroy) into the pipeline task.
#[derive(Debug)]
pub(crate) enum ChangeNotice {
    Change {
        name: String,
        generation: u64,
        kind: ChangeKind,
    },
    Shutdown,
}

/// Pipeline event loop. Holds only a weak reference so a dropped registry
/// shuts the loop down via the closed channel.
pub(crate) async fn run(inner: Weak<RegistryInner>, mut rx: UnboundedReceiver<ChangeNotice>) {
    debug!("reload pipeline started");
    while let Some(notice) = rx.recv().await {
        match notice {
            ChangeNotice::Shutdown => break,
            ChangeNotice::Change {
                name,
                generation,
                kind,
            } => {
                let Some(inner) = inner.upgrade() else { break };
                handle_change(&inner, &name, generation, kind);
            }
        }
    }
    debug!("reload pipeline finished");
}

/// `Idle → PendingReload` transition.
fn handle_change(inner: &Arc<RegistryInner>, name: &str, generation: u64, kind: ChangeKind) {
    if kind != ChangeKind::Content {
        debug!(name, ?kind, "ignoring non-content change");
        return;
    }

    let mut state = inner.lock_state();
    if state.destroyed {
        return;
    }
    let Some(entry) = state.entries.get_mut(name) else {
        debug!(name, "change notification for unknown entry; dropping");
        return;
    };
    if entry.generation != generation {
        debug!(name, "stale change notification; dropping");
        return;
    }
    if entry.pending.is_some() {
        debug!(name, "reload already pending; coalescing");
        return;
    }

    debug!(name, delay = ?inner.options.delay, "arming reload timer");
    let weak = Arc::downgrade(inner);
    let delay = inner.options.delay;
    let timer_name = name.to_string();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        fire(weak, timer_name, generation);
    });
    entry.pending = Some(timer.abort_handle());
}

/// `PendingReload → Idle` transition, on timer expiry.
fn fire(weak: Weak<RegistryInner>, name: String, generation: u64) {
    let Some(inner) = weak.upgrade() else { return };

    // Re-validate and disarm under the lock before doing anything.
    let watched = {
        let mut state = inner.lock_state();
        if state.destroyed {
            return;
        }
        let Some(entry) = state.entries.get_mut(&name) else {
            return;
        };
        if entry.generation != generation {
            return;
        }
        entry.pending = None;
        entry.source.watched_path().to_path_buf()
    };

    match perform_reload(&inner, &name, generation) {
        Ok(Some(path)) => {
            inner.events.emit(&RegistryEvent::Reload { name, path });
        }
        Ok(None) => {
            // Superseded while loading; nothing to report.
        }
        Err(RegistryError::Destroyed) | Err(RegistryError::NotFound(_)) => {
            // Lost the race against destroy/unregister between validation
            // and execution.
        }
        Err(err) => {
            warn!(name = %name, error = %err, "scheduled reload failed; keeping last artifact");
            inner.events.emit(&RegistryEvent::ReloadFailed {
                name,
                path: watched,
                error: err.to_string(),
            });
        }
    }
}

/// Re-resolve + re-load an entry's source and install the new artifact.
///
/// Shared between the pipeline timer and manual `Registry::reload`. The
/// two can race; both run the full sequence and the last install wins,
/// which is safe because a reload is an idempotent function of on-disk
/// state. Returns the watched path on install, or `None` when the entry
/// was superseded (unregistered, re-registered or destroyed) mid-load.
pub(crate) fn perform_reload(
    inner: &RegistryInner,
    name: &str,
    expected_generation: u64,
) -> Result<Option<PathBuf>> {
    let source = {
        let state = inner.lock_state();
        if state.destroyed {
            return Err(RegistryError::Destroyed);
        }
        let Some(entry) = state.entries.get(name) else {
            return Err(RegistryError::NotFound(name.to_string()));
        };
        if entry.generation != expected_generation {
            return Ok(None);
        }
        entry.source.clone()
    };

    let loaded: std::result::Result<SharedArtifact, LoaderError> = match &source {
        ModuleSource::File { canonical } => {
            inner.loader.forget(canonical);
            inner.loader.load(canonical)
        }
        ModuleSource::Package { root, .. } => {
            // Drop cached state for every file under the package before
            // re-reading the manifest, so a changed "main" takes effect.
            inner.loader.forget_package(root);
            inner
                .loader
                .resolve_package_main(root)
                .and_then(|main| inner.loader.load(&main))
        }
    };
    let artifact = loaded.map_err(|source_err| RegistryError::LoadFailed {
        name: name.to_string(),
        source: source_err,
    })?;

    let mut state = inner.lock_state();
    if state.destroyed {
        return Ok(None);
    }
    let Some(entry) = state.entries.get_mut(name) else {
        return Ok(None);
    };
    if entry.generation != expected_generation {
        return Ok(None);
    }
    entry.artifact = ArtifactState::Loaded(artifact);
    debug!(name, path = ?source.watched_path(), "installed reloaded artifact");
    Ok(Some(source.watched_path().to_path_buf()))
}
