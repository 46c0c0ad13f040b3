// src/loader/json.rs

//! Production loader for JSON module files and packages.
//!
//! Resolution rules:
//! - A file identifier resolves to the first of `<p>`, `<p>.json`,
//!   `<p>/index.json` that exists, canonicalized.
//! - A package identifier `name` resolves to `<root>/modules/<name>/`,
//!   which must contain a `package.json` manifest. The manifest's `"main"`
//!   field (default `index.json`) names the package's main file.
//!
//! Parsed documents are cached by canonical path; `forget` drops a single
//! entry and `forget_package` drops everything under a package root, so a
//! subsequent load reads fresh bytes.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::types::SharedArtifact;

use super::{Loader, LoaderError};

/// Manifest file watched for package registrations.
pub const PACKAGE_MANIFEST: &str = "package.json";
/// Main file used when the manifest has no `"main"` field.
pub const DEFAULT_PACKAGE_MAIN: &str = "index.json";
/// Directory under the loader root where packages are installed.
pub const PACKAGE_DIR: &str = "modules";

#[derive(Debug)]
pub struct JsonModuleLoader {
    root: PathBuf,
    cache: Mutex<HashMap<PathBuf, SharedArtifact>>,
}

impl JsonModuleLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached documents. Exposed for tests.
    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, SharedArtifact>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_document(path: &Path) -> Result<SharedArtifact, LoaderError> {
        let contents = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value = serde_json::from_str(&contents).map_err(|source| LoaderError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Arc::new(value))
    }
}

/// `<p>` with `.json` appended (not substituted, so `a.b` becomes
/// `a.b.json`).
fn with_json_suffix(path: &Path) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_os_string();
    s.push(".json");
    PathBuf::from(s)
}

impl Loader for JsonModuleLoader {
    fn resolve(&self, path: &Path) -> Result<PathBuf, LoaderError> {
        let candidates = [
            path.to_path_buf(),
            with_json_suffix(path),
            path.join(DEFAULT_PACKAGE_MAIN),
        ];
        for candidate in &candidates {
            if candidate.is_file() {
                return candidate.canonicalize().map_err(|source| LoaderError::Io {
                    path: candidate.clone(),
                    source,
                });
            }
        }
        Err(LoaderError::Resolution(format!(
            "no module file for {}",
            path.display()
        )))
    }

    fn load(&self, canonical: &Path) -> Result<SharedArtifact, LoaderError> {
        if let Some(artifact) = self.lock_cache().get(canonical) {
            return Ok(Arc::clone(artifact));
        }

        debug!(path = ?canonical, "cache miss: reading module document");
        let artifact = Self::read_document(canonical)?;
        self.lock_cache()
            .insert(canonical.to_path_buf(), Arc::clone(&artifact));
        Ok(artifact)
    }

    fn forget(&self, canonical: &Path) {
        if self.lock_cache().remove(canonical).is_some() {
            debug!(path = ?canonical, "forgot cached document");
        }
    }

    fn resolve_package_root(&self, identifier: &str) -> Result<PathBuf, LoaderError> {
        let dir = self.root.join(PACKAGE_DIR).join(identifier);
        if !dir.join(PACKAGE_MANIFEST).is_file() {
            return Err(LoaderError::Resolution(format!(
                "cannot get package base directory for \"{identifier}\""
            )));
        }
        dir.canonicalize().map_err(|source| LoaderError::Io {
            path: dir,
            source,
        })
    }

    fn resolve_package_main(&self, root: &Path) -> Result<PathBuf, LoaderError> {
        let manifest = self.resolve(&root.join(PACKAGE_MANIFEST))?;
        let doc = self.load(&manifest)?;
        let main = doc
            .get("main")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_PACKAGE_MAIN);
        self.resolve(&root.join(main))
    }

    fn forget_package(&self, root: &Path) {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let mut cache = self.lock_cache();
        let before = cache.len();
        cache.retain(|path, _| !path.starts_with(&root));
        let dropped = before - cache.len();
        if dropped > 0 {
            debug!(root = ?root, dropped, "forgot cached package documents");
        }
    }
}
