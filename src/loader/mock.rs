// src/loader/mock.rs

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::types::SharedArtifact;

use super::{Loader, LoaderError};

/// In-memory loader for tests.
///
/// Modules and packages are injected up front; `insert_module` on an
/// existing path replaces its document, which is what a file edit looks
/// like from the registry's point of view. There is no internal cache, so
/// `forget` calls are observable through [`MockLoader::forgotten`] without
/// affecting what `load` returns.
#[derive(Debug, Default)]
pub struct MockLoader {
    inner: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    modules: HashMap<PathBuf, Value>,
    packages: HashMap<String, PathBuf>,
    mains: HashMap<PathBuf, PathBuf>,
    failing: HashSet<PathBuf>,
    loads: HashMap<PathBuf, usize>,
    forgotten: Vec<PathBuf>,
    forgotten_packages: Vec<PathBuf>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or overwrite) a module document at `path`.
    pub fn insert_module(&self, path: impl Into<PathBuf>, value: Value) {
        self.lock().modules.insert(path.into(), value);
    }

    /// Add a package: `identifier` resolves to `root`, whose main file is
    /// `main` with the given document.
    pub fn insert_package(
        &self,
        identifier: &str,
        root: impl Into<PathBuf>,
        main: impl Into<PathBuf>,
        value: Value,
    ) {
        let root = root.into();
        let main = main.into();
        let mut state = self.lock();
        state.packages.insert(identifier.to_string(), root.clone());
        state.mains.insert(root, main.clone());
        state.modules.insert(main, value);
    }

    /// Make subsequent loads of `path` fail until cleared.
    pub fn fail_loads_of(&self, path: impl Into<PathBuf>) {
        self.lock().failing.insert(path.into());
    }

    pub fn clear_failure(&self, path: &Path) {
        self.lock().failing.remove(path);
    }

    /// How many times `load` was called for `path`.
    pub fn load_count(&self, path: &Path) -> usize {
        self.lock().loads.get(path).copied().unwrap_or(0)
    }

    /// Every path passed to `forget`, in order.
    pub fn forgotten(&self) -> Vec<PathBuf> {
        self.lock().forgotten.clone()
    }

    /// Every root passed to `forget_package`, in order.
    pub fn forgotten_packages(&self) -> Vec<PathBuf> {
        self.lock().forgotten_packages.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Loader for MockLoader {
    fn resolve(&self, path: &Path) -> Result<PathBuf, LoaderError> {
        let state = self.lock();
        if state.modules.contains_key(path) {
            Ok(path.to_path_buf())
        } else {
            Err(LoaderError::Resolution(format!(
                "no mock module at {}",
                path.display()
            )))
        }
    }

    fn load(&self, canonical: &Path) -> Result<SharedArtifact, LoaderError> {
        let mut state = self.lock();
        *state.loads.entry(canonical.to_path_buf()).or_insert(0) += 1;
        if state.failing.contains(canonical) {
            return Err(LoaderError::Failed(format!(
                "mock load failure for {}",
                canonical.display()
            )));
        }
        state
            .modules
            .get(canonical)
            .map(|value| Arc::new(value.clone()))
            .ok_or_else(|| {
                LoaderError::Resolution(format!("no mock module at {}", canonical.display()))
            })
    }

    fn forget(&self, canonical: &Path) {
        self.lock().forgotten.push(canonical.to_path_buf());
    }

    fn resolve_package_root(&self, identifier: &str) -> Result<PathBuf, LoaderError> {
        self.lock()
            .packages
            .get(identifier)
            .cloned()
            .ok_or_else(|| {
                LoaderError::Resolution(format!(
                    "cannot get package base directory for \"{identifier}\""
                ))
            })
    }

    fn resolve_package_main(&self, root: &Path) -> Result<PathBuf, LoaderError> {
        self.lock().mains.get(root).cloned().ok_or_else(|| {
            LoaderError::Resolution(format!("no mock package main under {}", root.display()))
        })
    }

    fn forget_package(&self, root: &Path) {
        self.lock().forgotten_packages.push(root.to_path_buf());
    }
}
