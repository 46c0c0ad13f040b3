// src/config.rs

//! Registry construction options.
//!
//! Options can be built in code (`RegistryOptions::new()` + setters) or
//! deserialized from a TOML section via [`RawRegistryOptions`], e.g. for
//! embedders that keep a `[registry]` table in their own config file:
//!
//! ```toml
//! root_path = "./fixtures"
//! reload = true
//! delay_ms = 50
//! ```
//!
//! Raw values are normalized before use:
//! - a relative `root_path` is resolved against the current directory,
//! - `delay_ms` values of zero (or absent) fall back to the 100ms default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::Result;

/// Default debounce delay applied when none (or zero) is configured.
pub const DEFAULT_DELAY_MS: u64 = 100;

/// Options as read from a TOML table, before normalization.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRegistryOptions {
    /// Base path used to resolve relative registrations. Defaults to `"."`.
    #[serde(default)]
    pub root_path: Option<PathBuf>,

    /// Whether entries are watched and automatically reloaded.
    #[serde(default)]
    pub reload: Option<bool>,

    /// Debounce delay in milliseconds. Zero falls back to the default.
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

/// Normalized registry options.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub root_path: PathBuf,
    pub reload: bool,
    pub delay: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            reload: false,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
        }
    }
}

impl RegistryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_path = path.into();
        self
    }

    pub fn reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Apply the coercions the registry relies on: an absolute root path and
    /// a strictly positive debounce delay.
    pub(crate) fn normalized(mut self) -> Self {
        if self.root_path.is_relative() {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            self.root_path = cwd.join(&self.root_path);
        }
        if self.delay.is_zero() {
            self.delay = Duration::from_millis(DEFAULT_DELAY_MS);
        }
        self
    }
}

impl From<RawRegistryOptions> for RegistryOptions {
    fn from(raw: RawRegistryOptions) -> Self {
        let defaults = RegistryOptions::default();
        Self {
            root_path: raw.root_path.unwrap_or(defaults.root_path),
            reload: raw.reload.unwrap_or(defaults.reload),
            delay: raw
                .delay_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.delay),
        }
    }
}

/// Load registry options from a TOML file.
///
/// This only performs deserialization plus the standard coercions; the
/// options are normalized again at registry construction.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RegistryOptions> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let raw: RawRegistryOptions = toml::from_str(&contents)?;
    Ok(RegistryOptions::from(raw))
}
