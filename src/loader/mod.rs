// src/loader/mod.rs

//! The module-loading capability consumed by the registry.
//!
//! The registry never touches the filesystem for module content itself; it
//! goes through a [`Loader`]:
//! - resolving identifiers to canonical file paths,
//! - producing artifacts from canonical paths,
//! - managing the lower-level parse cache (`forget` / `forget_package`).
//!
//! Production code uses [`JsonModuleLoader`]; tests can use [`MockLoader`].

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::SharedArtifact;

pub mod json;
pub mod mock;

pub use json::{JsonModuleLoader, DEFAULT_PACKAGE_MAIN, PACKAGE_DIR, PACKAGE_MANIFEST};
pub use mock::MockLoader;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("cannot resolve \"{0}\"")]
    Resolution(String),

    #[error("io error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid module document {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("load failed: {0}")]
    Failed(String),
}

/// Abstract module loader.
///
/// `forget` and `forget_package` must be no-ops for paths with no cached
/// state; they never fail.
pub trait Loader: Send + Sync + Debug {
    /// Resolve a file identifier to its canonical on-disk identity.
    fn resolve(&self, path: &Path) -> Result<PathBuf, LoaderError>;

    /// Produce the artifact for a canonical path, reading through any cache.
    fn load(&self, canonical: &Path) -> Result<SharedArtifact, LoaderError>;

    /// Discard cached state for one path.
    fn forget(&self, canonical: &Path);

    /// Locate the installation root of a named package.
    fn resolve_package_root(&self, identifier: &str) -> Result<PathBuf, LoaderError>;

    /// Resolve the package's main file from its manifest.
    fn resolve_package_main(&self, root: &Path) -> Result<PathBuf, LoaderError>;

    /// Path of the manifest file inside a package root. This is what gets
    /// watched for package registrations.
    fn package_manifest(&self, root: &Path) -> PathBuf {
        root.join(PACKAGE_MANIFEST)
    }

    /// Discard cached state for every file under a package root.
    fn forget_package(&self, root: &Path);
}
