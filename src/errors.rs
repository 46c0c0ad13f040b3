// src/errors.rs

//! Crate-wide error types and the `Result` alias.

use thiserror::Error;

use crate::loader::LoaderError;
use crate::watch::WatchError;

#[derive(Error, Debug)]
pub enum RegistryError {
    /// Any operation attempted after `destroy()` has completed.
    #[error("registry has been destroyed")]
    Destroyed,

    /// `destroy()` called a second time.
    #[error("registry has already been destroyed")]
    AlreadyDestroyed,

    /// Lookup or reload on a name with no loaded entry.
    #[error("cannot find module \"{0}\"")]
    NotFound(String),

    /// Property lookup on an artifact that lacks that member.
    #[error("module \"{name}\" has no property named \"{property}\"")]
    NoSuchProperty { name: String, property: String },

    /// Registering a name that already has a live entry. Callers must
    /// unregister first.
    #[error("module \"{0}\" is already registered")]
    AlreadyRegistered(String),

    /// Loader resolution or load failed during register or reload.
    #[error("failed to load module \"{name}\"")]
    LoadFailed {
        name: String,
        #[source]
        source: LoaderError,
    },

    /// Watch subscription failed during register.
    #[error("failed to watch source of module \"{name}\"")]
    WatchFailed {
        name: String,
        #[source]
        source: WatchError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RegistryError>;
