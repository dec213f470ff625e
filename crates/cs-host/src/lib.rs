//! Host services for cscripter scripts
//!
//! Scripts reach the host two ways: `require` for capability tables the host
//! registered by name, and `resolver` for arbitrary exports of native
//! libraries. Compiled scripts are fully trusted; neither path checks
//! signatures.

pub mod api;
pub mod registry;
pub mod resolver;

pub use registry::{CapabilityTable, ModuleRegistry};
pub use resolver::{resolve, resolve_symbol};
