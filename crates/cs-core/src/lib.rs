//! Core types for cscripter
//!
//! Configuration, error types and logging shared by every crate in the
//! workspace.

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{CaptureError, ConfigError, EngineError, HostError};
