//! Shared helpers for engine tests

#![allow(dead_code)]

use cs_core::config::LIBRARY_ENV;
use cs_core::{Config, EngineError};
use cs_engine::Engine;

/// Set to `1` to fail instead of skip when no libtcc loads
pub const REQUIRE_ENV: &str = "CSCRIPTER_REQUIRE_LIBTCC";

/// An engine on the default configuration, or `None` when no libtcc can be
/// loaded on this machine
pub fn engine() -> Option<Engine> {
    engine_with(Config::default())
}

pub fn engine_with(config: Config) -> Option<Engine> {
    cs_core::logging::init_default();

    let skippable = skip_allowed(&config);
    match Engine::new(config) {
        Ok(engine) => Some(engine),
        Err(EngineError::LibraryNotFound { tried }) if skippable => {
            eprintln!("skipping: libtcc not available (tried: {})", tried);
            None
        }
        Err(e) => panic!("failed to create engine: {}", e),
    }
}

/// A missing compiler only skips a test when nobody asked for a specific one
pub fn skip_allowed(config: &Config) -> bool {
    let required = std::env::var(REQUIRE_ENV).is_ok_and(|value| value == "1");
    let explicit = std::env::var_os(LIBRARY_ENV).is_some() || config.compiler.library.is_some();
    !required && !explicit
}
