use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The in-memory value produced by loading a source.
///
/// Registered modules are arbitrary, so the artifact type is an open
/// record: a parsed JSON document shared behind an `Arc`. Readers clone
/// the `Arc`, never the document.
pub type SharedArtifact = Arc<serde_json::Value>;

/// Tagged per-entry artifact state.
///
/// `Unloaded` and "loaded a value that happens to be null" are distinct
/// states, so a module whose document is `null`, `0` or `""` is still
/// retrievable.
#[derive(Debug, Clone, Default)]
pub enum ArtifactState {
    #[default]
    Unloaded,
    Loaded(SharedArtifact),
}

impl ArtifactState {
    pub fn loaded(&self) -> Option<&SharedArtifact> {
        match self {
            ArtifactState::Loaded(artifact) => Some(artifact),
            ArtifactState::Unloaded => None,
        }
    }
}

/// How a registered name maps onto the filesystem.
#[derive(Debug, Clone)]
pub enum ModuleSource {
    /// A direct file registration (`./relative` or `/absolute`).
    File { canonical: PathBuf },
    /// A package registration. The artifact comes from the package's main
    /// file, but the watched source is the package manifest.
    Package {
        identifier: String,
        root: PathBuf,
        manifest: PathBuf,
    },
}

impl ModuleSource {
    /// The path used for change detection.
    pub fn watched_path(&self) -> &Path {
        match self {
            ModuleSource::File { canonical } => canonical,
            ModuleSource::Package { manifest, .. } => manifest,
        }
    }

    /// The original package identifier, if this is a package registration.
    pub fn package_id(&self) -> Option<&str> {
        match self {
            ModuleSource::File { .. } => None,
            ModuleSource::Package { identifier, .. } => Some(identifier),
        }
    }
}

/// Snapshot of an entry at the moment it was unregistered, carried on the
/// `Unregister` event.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub name: String,
    pub source_path: PathBuf,
    pub package: Option<String>,
    pub artifact: Option<SharedArtifact>,
}
