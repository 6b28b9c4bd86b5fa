//! Engine Configuration Module
//!
//! Provides the analysis engine's heuristic constants loaded from TOML,
//! so every threshold the analyzers and scorer use is operator-tunable.
//!
//! ## Loading Order
//!
//! 1. `PLANT_INSIGHT_CONFIG` environment variable (path to TOML file)
//! 2. `insight_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Library components take their config section at construction. The binary
//! installs a process-wide copy once at startup:
//!
//! ```ignore
//! config::init(EngineConfig::load());
//! let weights = &config::get().scoring;
//! ```

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;

use std::sync::OnceLock;

/// Global engine configuration, initialized once at startup.
static ENGINE_CONFIG: OnceLock<EngineConfig> = OnceLock::new();

/// Initialize the global engine configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: EngineConfig) {
    if ENGINE_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global engine configuration.
///
/// Falls back to built-in defaults if `init()` was never called.
pub fn get() -> &'static EngineConfig {
    ENGINE_CONFIG.get_or_init(EngineConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    ENGINE_CONFIG.get().is_some()
}
