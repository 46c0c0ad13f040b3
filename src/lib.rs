// src/lib.rs

//! modreg — a live module registry.
//!
//! Callers register named bindings to on-disk code units (JSON module
//! files or installed packages), retrieve them by name, and optionally get
//! automatic cache invalidation and reload when the underlying source
//! changes on disk. Bursts of filesystem events are debounced into a
//! single reload; lookups never block on a reload in flight.
//!
//! ```no_run
//! use modreg::{Registry, RegistryOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Registry::new(RegistryOptions::new().reload(true))?;
//!     registry.register("settings", "./settings")?;
//!     let name = registry.get_property("settings", "name")?;
//!     println!("settings.name = {name}");
//!     registry.destroy()?;
//!     Ok(())
//! }
//! ```
//!
//! Module loading and filesystem watching are capabilities behind the
//! [`loader::Loader`] and [`watch::WatchBackend`] traits; the production
//! implementations can be swapped out via [`Registry::with_backends`].

pub mod config;
pub mod errors;
pub mod events;
pub mod loader;
pub mod logging;
pub mod registry;
pub mod types;
pub mod watch;

pub use config::{DEFAULT_DELAY_MS, RawRegistryOptions, RegistryOptions};
pub use errors::{RegistryError, Result};
pub use events::{EventKind, ListenerId, RegistryEvent};
pub use registry::Registry;
pub use types::{ArtifactState, EntrySnapshot, ModuleSource, SharedArtifact};
