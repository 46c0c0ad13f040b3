// src/registry/mod.rs

//! The module registry.
//!
//! This module ties together:
//! - the name → [`Entry`] mapping and its lookup path
//! - register/unregister with atomic failure semantics
//! - the debounce/reload pipeline in [`pipeline`]
//! - the destroy lifecycle that makes every later operation fail
//!
//! The registry is cheaply cloneable (all state is behind one `Arc`);
//! clones observe the same entries and the same destroyed flag. Public
//! operations are synchronous: they take the state lock, mutate, release.
//! Watcher sinks and timer callbacks go through the same lock and carry a
//! generation token so stale callbacks are defused rather than trusted.

pub(crate) mod entry;
pub(crate) mod pipeline;

use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info};

use crate::config::RegistryOptions;
use crate::errors::{RegistryError, Result};
use crate::events::{EventBus, EventKind, ListenerId, RegistryEvent};
use crate::loader::{JsonModuleLoader, Loader, LoaderError};
use crate::types::{ModuleSource, SharedArtifact};
use crate::watch::{ChangeSink, FileChange, NotifyBackend, WatchBackend};

use entry::Entry;
use pipeline::ChangeNotice;

/// Live module registry: named bindings to on-disk code units, with
/// optional debounced auto-reload.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    pub(crate) options: RegistryOptions,
    pub(crate) loader: Arc<dyn Loader>,
    pub(crate) watcher: Arc<dyn WatchBackend>,
    pub(crate) events: EventBus,
    pub(crate) state: Mutex<RegistryState>,
    pub(crate) change_tx: UnboundedSender<ChangeNotice>,
    generations: AtomicU64,
}

#[derive(Default)]
pub(crate) struct RegistryState {
    pub(crate) entries: HashMap<String, Entry>,
    pub(crate) destroyed: bool,
}

impl RegistryInner {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Purely syntactic classification: a leading `.` or path separator means
/// a direct file path, anything else a package identifier.
fn is_path(source: &str) -> bool {
    source.starts_with('.')
        || source
            .chars()
            .next()
            .is_some_and(std::path::is_separator)
}

fn load_failed(name: &str, source: LoaderError) -> RegistryError {
    RegistryError::LoadFailed {
        name: name.to_string(),
        source,
    }
}

impl Registry {
    /// Create a registry with the production JSON loader and notify-based
    /// watch backend.
    ///
    /// Must be called inside a tokio runtime; the reload pipeline runs as
    /// a spawned task.
    pub fn new(options: RegistryOptions) -> Result<Self> {
        let options = options.normalized();
        let loader = Arc::new(JsonModuleLoader::new(options.root_path.clone()));
        Self::with_backends(options, loader, Arc::new(NotifyBackend::new()))
    }

    /// Create a registry over explicit loader and watch capabilities.
    pub fn with_backends(
        options: RegistryOptions,
        loader: Arc<dyn Loader>,
        watcher: Arc<dyn WatchBackend>,
    ) -> Result<Self> {
        let options = options.normalized();
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            RegistryError::Config("the registry must be created inside a tokio runtime".into())
        })?;

        let (change_tx, change_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(RegistryInner {
            options,
            loader,
            watcher,
            events: EventBus::new(),
            state: Mutex::new(RegistryState::default()),
            change_tx,
            generations: AtomicU64::new(1),
        });

        handle.spawn(pipeline::run(Arc::downgrade(&inner), change_rx));

        info!(
            root = ?inner.options.root_path,
            reload = inner.options.reload,
            delay = ?inner.options.delay,
            "registry created"
        );
        Ok(Self { inner })
    }

    /// Get the current artifact for a registered name.
    ///
    /// Pure read: never triggers loading and never waits on an in-flight
    /// reload. During a debounce window this returns the previous
    /// artifact, which is intentional.
    pub fn get(&self, name: &str) -> Result<SharedArtifact> {
        let state = self.inner.lock_state();
        if state.destroyed {
            return Err(RegistryError::Destroyed);
        }
        state
            .entries
            .get(name)
            .and_then(|entry| entry.artifact.loaded())
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Get one named member of a registered artifact.
    ///
    /// Fails with `NoSuchProperty` when the artifact lacks that member,
    /// including when the artifact is not an object at all.
    pub fn get_property(&self, name: &str, property: &str) -> Result<serde_json::Value> {
        let artifact = self.get(name)?;
        artifact
            .as_object()
            .and_then(|members| members.get(property))
            .cloned()
            .ok_or_else(|| RegistryError::NoSuchProperty {
                name: name.to_string(),
                property: property.to_string(),
            })
    }

    /// Register a name against a file path or package identifier.
    ///
    /// Atomic: on any resolution, load or watch failure no entry is
    /// installed and a retry with the same name is safe. Registering a
    /// name that is already live is an error; unregister first.
    pub fn register(&self, name: &str, source: &str) -> Result<&Self> {
        {
            let state = self.inner.lock_state();
            if state.destroyed {
                return Err(RegistryError::Destroyed);
            }
            if state.entries.contains_key(name) {
                return Err(RegistryError::AlreadyRegistered(name.to_string()));
            }
        }

        let module_source = self.resolve_source(name, source)?;

        let artifact = match &module_source {
            ModuleSource::File { canonical } => self
                .inner
                .loader
                .load(canonical)
                .map_err(|e| load_failed(name, e))?,
            ModuleSource::Package { root, .. } => {
                let main = self
                    .inner
                    .loader
                    .resolve_package_main(root)
                    .map_err(|e| load_failed(name, e))?;
                self.inner
                    .loader
                    .load(&main)
                    .map_err(|e| load_failed(name, e))?
            }
        };

        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);

        let watch = if self.inner.options.reload {
            Some(self.subscribe_watch(name, module_source.watched_path(), generation)?)
        } else {
            None
        };

        let path = module_source.watched_path().to_path_buf();
        let package = module_source.package_id().map(str::to_string);
        let new_entry = Entry::new(name.to_string(), module_source, artifact, watch, generation);

        {
            let mut state = self.inner.lock_state();
            if state.destroyed {
                // Destroy ran while we were loading. Dropping the entry
                // closes the watch we just opened.
                return Err(RegistryError::Destroyed);
            }
            match state.entries.entry(name.to_string()) {
                MapEntry::Occupied(_) => {
                    return Err(RegistryError::AlreadyRegistered(name.to_string()));
                }
                MapEntry::Vacant(slot) => {
                    slot.insert(new_entry);
                }
            }
        }

        debug!(name, path = ?path, package = ?package, "registered module");
        self.inner.events.emit(&RegistryEvent::Register {
            name: name.to_string(),
            path,
            package,
        });
        Ok(self)
    }

    /// Remove a name. A no-op for unknown names; still fails after
    /// destroy.
    ///
    /// This only removes the registry's binding: the loader's lower-level
    /// cache is deliberately left untouched.
    pub fn unregister(&self, name: &str) -> Result<&Self> {
        let removed = {
            let mut state = self.inner.lock_state();
            if state.destroyed {
                return Err(RegistryError::Destroyed);
            }
            state.entries.remove(name)
        };

        let Some(mut removed_entry) = removed else {
            return Ok(self);
        };
        let snapshot = removed_entry.snapshot();
        removed_entry.teardown();

        debug!(name, "unregistered module");
        self.inner.events.emit(&RegistryEvent::Unregister {
            name: name.to_string(),
            entry: snapshot,
        });
        Ok(self)
    }

    /// Reload a name immediately, bypassing the debounce timer.
    ///
    /// May race an armed timer; both reloads run and the last install
    /// wins, at the cost of a second `Reload` event.
    pub fn reload(&self, name: &str) -> Result<&Self> {
        let generation = {
            let state = self.inner.lock_state();
            if state.destroyed {
                return Err(RegistryError::Destroyed);
            }
            state
                .entries
                .get(name)
                .map(|entry| entry.generation)
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))?
        };

        debug!(name, "manual reload");
        if let Some(path) = pipeline::perform_reload(&self.inner, name, generation)? {
            self.inner.events.emit(&RegistryEvent::Reload {
                name: name.to_string(),
                path,
            });
        }
        Ok(self)
    }

    /// Tear down every entry and shut the registry.
    ///
    /// After this, every operation (including a second destroy) fails.
    /// Emits `Destroy`, then detaches all listeners.
    pub fn destroy(&self) -> Result<()> {
        let entries = {
            let mut state = self.inner.lock_state();
            if state.destroyed {
                return Err(RegistryError::AlreadyDestroyed);
            }
            state.destroyed = true;
            std::mem::take(&mut state.entries)
        };

        for (name, mut removed_entry) in entries {
            debug!(name = %name, "tearing down entry");
            removed_entry.teardown();
        }

        let _ = self.inner.change_tx.send(ChangeNotice::Shutdown);

        info!("registry destroyed");
        self.inner.events.emit(&RegistryEvent::Destroy);
        self.inner.events.clear();
        Ok(())
    }

    /// Attach a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> Result<ListenerId>
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.ensure_alive()?;
        Ok(self.inner.events.on(kind, callback))
    }

    /// Attach a listener that detaches itself after its first call.
    pub fn once<F>(&self, kind: EventKind, callback: F) -> Result<ListenerId>
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.ensure_alive()?;
        Ok(self.inner.events.once(kind, callback))
    }

    /// Detach a listener. Returns whether the id was still attached.
    pub fn off(&self, id: ListenerId) -> Result<bool> {
        self.ensure_alive()?;
        Ok(self.inner.events.off(id))
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.inner.lock_state().destroyed {
            Err(RegistryError::Destroyed)
        } else {
            Ok(())
        }
    }

    fn resolve_source(&self, name: &str, source: &str) -> Result<ModuleSource> {
        if is_path(source) {
            let joined = self.inner.options.root_path.join(source);
            let canonical = self
                .inner
                .loader
                .resolve(&joined)
                .map_err(|e| load_failed(name, e))?;
            debug!(name, file = ?canonical, "registering file module");
            Ok(ModuleSource::File { canonical })
        } else {
            let root = self
                .inner
                .loader
                .resolve_package_root(source)
                .map_err(|e| load_failed(name, e))?;
            let manifest = self.inner.loader.package_manifest(&root);
            debug!(name, package = source, manifest = ?manifest, "registering package module");
            Ok(ModuleSource::Package {
                identifier: source.to_string(),
                root,
                manifest,
            })
        }
    }

    fn subscribe_watch(
        &self,
        name: &str,
        watched: &Path,
        generation: u64,
    ) -> Result<Box<dyn crate::watch::WatchHandle>> {
        let tx = self.inner.change_tx.clone();
        let entry_name = name.to_string();
        let sink: ChangeSink = Box::new(move |change: FileChange| {
            let _ = tx.send(ChangeNotice::Change {
                name: entry_name.clone(),
                generation,
                kind: change.kind,
            });
        });
        self.inner
            .watcher
            .subscribe(watched, sink)
            .map_err(|source| RegistryError::WatchFailed {
                name: name.to_string(),
                source,
            })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("Registry")
            .field("destroyed", &state.destroyed)
            .field("entries", &state.entries.len())
            .finish_non_exhaustive()
    }
}
