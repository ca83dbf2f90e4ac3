//! Configuration Module
//!
//! Provides the service configuration loaded from TOML files, with the
//! original environment variables layered on top.
//!
//! ## Loading Order
//!
//! 1. `SMART_RECYCLE_CONFIG` environment variable (path to TOML file)
//! 2. `smart_recycle.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Environment overrides (`OPENAI_API_KEY`, `QDRANT_URL`, `TOP_K`, ...) are
//! applied after whichever source won.
//!
//! ## Usage
//!
//! The binary calls `config::init()` once at startup. Library components never
//! reach for the global; they are handed their section explicitly.
//!
//! ```ignore
//! config::init(Settings::load());
//! let top_k = config::get().classification.top_k;
//! ```

mod settings;
pub mod defaults;

pub use settings::*;

use std::sync::OnceLock;

/// Global settings, initialized once at startup.
static SETTINGS: OnceLock<Settings> = OnceLock::new();

/// Initialize the global settings.
///
/// Subsequent calls are ignored with a warning.
pub fn init(settings: Settings) {
    if SETTINGS.set(settings).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the global settings, falling back to built-in defaults when `init()`
/// was never called (tests, embedded use).
pub fn get() -> &'static Settings {
    SETTINGS.get_or_init(Settings::default)
}
