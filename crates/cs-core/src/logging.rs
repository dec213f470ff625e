//! Logging infrastructure for cscripter
//!
//! Every layer writes to stderr or a file. Stdout is left to compiled
//! scripts, whose output the engine captures.

use std::fs::File;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, LogLevel};

impl LogLevel {
    /// Most verbose level let through, `None` for [`LogLevel::Off`]
    pub fn filter(self) -> Option<LevelFilter> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(LevelFilter::ERROR),
            LogLevel::Warn => Some(LevelFilter::WARN),
            LogLevel::Info => Some(LevelFilter::INFO),
            LogLevel::Debug => Some(LevelFilter::DEBUG),
            LogLevel::Trace => Some(LevelFilter::TRACE),
        }
    }
}

/// Install the global subscriber described by `config.debug`.
///
/// `RUST_LOG` directives refine the configured level. A second call, or a
/// call after another subscriber was installed, is ignored.
pub fn init(config: &Config) {
    let Some(level) = config.debug.log_level.filter() else {
        return;
    };

    // A log file that cannot be created falls back to stderr only
    let file_layer = config
        .debug
        .log_to_file
        .then(|| File::create(&config.debug.log_path).ok())
        .flatten()
        .map(|file| fmt::layer().with_writer(file).with_ansi(false));

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(file_layer)
        .try_init();
}

/// Stderr logging at `info`, for tests and hosts without a config file
pub fn init_default() {
    init(&Config::default());
}

// Component-specific logging

/// Log a compiler trace message
#[macro_export]
macro_rules! compiler_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "compiler", $($arg)*)
    };
}

/// Log a compiler debug message
#[macro_export]
macro_rules! compiler_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "compiler", $($arg)*)
    };
}

/// Log a capture trace message
#[macro_export]
macro_rules! capture_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "capture", $($arg)*)
    };
}

/// Log a host API debug message
#[macro_export]
macro_rules! host_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "host", $($arg)*)
    };
}
