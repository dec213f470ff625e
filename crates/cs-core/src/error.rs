//! Error types for cscripter

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by the compilation/execution engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Compiler library not found (tried: {tried})")]
    LibraryNotFound { tried: String },

    #[error("Compiler library does not export `{0}`")]
    MissingExport(String),

    #[error("Failed to create compiler session")]
    SessionCreation,

    #[error("No compiler session; call init() first")]
    NoSession,

    #[error("Session already holds a compiled program; reinit() first")]
    ProgramLoaded,

    #[error("Nothing has been compiled in this session")]
    NotCompiled,

    #[error("Invalid symbol name {0:?}: contains a NUL byte")]
    InvalidName(String),

    #[error("Compiler rejected symbol `{0}`")]
    SymbolRejected(String),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Compilation failed: {0}")]
    Compile(String),

    #[error("Relocation failed: {0}")]
    Relocate(String),

    #[error("Entry symbol `{0}` not found")]
    SymbolNotFound(String),

    #[error("Output capture failed: {0}")]
    Capture(#[from] CaptureError),
}

/// Errors reported by the stdout capture scope
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Another capture scope is already active")]
    AlreadyActive,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors reported by the native resolver and module registry
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to load library {library}: {reason}")]
    LibraryLoad { library: String, reason: String },

    #[error("Symbol {function} not found in {library}: {reason}")]
    SymbolLookup {
        library: String,
        function: String,
        reason: String,
    },

    #[error("Invalid name {0:?}")]
    InvalidName(String),

    #[error("Module registry already installed")]
    AlreadyInstalled,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
