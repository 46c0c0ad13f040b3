// src/logging.rs

//! Optional logging setup using `tracing` + `tracing-subscriber`.
//!
//! The library itself only emits `tracing` events; embedders that already
//! have a subscriber should ignore this module. For quick starts and
//! examples, `init_logging()` installs a global subscriber with the level
//! taken from the `MODREG_LOG` environment variable (e.g. "info",
//! "debug"), defaulting to `info`.
//!
//! Logs go to STDERR.

use anyhow::Result;
use tracing_subscriber::fmt;

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging() -> Result<()> {
    let level = std::env::var("MODREG_LOG")
        .ok()
        .and_then(|s| parse_level_str(&s))
        .unwrap_or(tracing::Level::INFO);

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
