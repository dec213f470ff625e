//! Configuration management

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable that overrides [`CompilerConfig::library`]
pub const LIBRARY_ENV: &str = "CSCRIPTER_LIBTCC";

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub compiler: CompilerConfig,
    pub engine: EngineConfig,
    pub debug: DebugConfig,
}

/// Embedded compiler settings, applied to every fresh session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Explicit path to the `libtcc` shared library
    pub library: Option<PathBuf>,
    /// Directory holding `libtcc1.a` and the compiler's own headers
    pub runtime_path: Option<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    pub library_paths: Vec<PathBuf>,
    /// Libraries linked into every program, by short name (`m`, not `libm.so`)
    pub libraries: Vec<String>,
    /// Preprocessor definitions; an empty value defines the macro as `1`
    pub defines: BTreeMap<String, String>,
    /// Raw command-line style options handed to the compiler
    pub options: String,
}

impl CompilerConfig {
    /// Library paths to try, in order
    pub fn library_candidates(&self) -> Vec<PathBuf> {
        if let Some(path) = std::env::var_os(LIBRARY_ENV) {
            return vec![PathBuf::from(path)];
        }
        if let Some(path) = &self.library {
            return vec![path.clone()];
        }
        default_library_candidates()
    }
}

#[cfg(target_os = "macos")]
fn default_library_candidates() -> Vec<PathBuf> {
    ["libtcc.dylib", "/usr/local/lib/libtcc.dylib", "/opt/homebrew/lib/libtcc.dylib"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

#[cfg(not(target_os = "macos"))]
fn default_library_candidates() -> Vec<PathBuf> {
    [
        "libtcc.so",
        "libtcc.so.1",
        "/usr/local/lib/libtcc.so",
        "/usr/lib/libtcc.so",
        "/usr/lib/x86_64-linux-gnu/libtcc.so",
        "/usr/lib/aarch64-linux-gnu/libtcc.so",
        "/usr/lib64/libtcc.so",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

/// Engine behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Inject `require` and `resolver` into every session
    pub inject_host_api: bool,
    /// Redirect stdout while an entry point runs
    pub capture_output: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inject_host_api: true,
            capture_output: true,
        }
    }
}

/// Debug configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_path: PathBuf,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_to_file: false,
            log_path: PathBuf::from("cscripter.log"),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl Config {
    /// Load the configuration from the default location
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load the configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Save the configuration to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = Self::config_path() else {
            return Err(ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no configuration directory",
            )));
        };
        self.save_to(&path)
    }

    /// Save the configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Path of the configuration file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cscripter").join("config.toml"))
    }
}
