//! Module registry
//!
//! Maps logical module names to host capability tables that scripts obtain
//! with `require("name")`. The process-wide registry is installed once at
//! start-up and is read-only afterwards.

use std::collections::HashMap;
use std::ptr::NonNull;

use cs_core::error::HostError;
use libc::c_void;
use once_cell::sync::OnceCell;

/// Pointer to a host-defined record of function pointers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityTable(NonNull<c_void>);

// SAFETY: tables are immutable `'static` data shared with scripts. `new`
// requires `T: Sync`; `from_raw` puts the burden on the caller.
unsafe impl Send for CapabilityTable {}
unsafe impl Sync for CapabilityTable {}

impl CapabilityTable {
    /// Wrap a `'static` table, usually a `#[repr(C)]` struct of `extern "C"` fns
    pub fn new<T: Sync + 'static>(table: &'static T) -> Self {
        Self(NonNull::from(table).cast())
    }

    /// Wrap a table that lives outside Rust
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid and unmodified for the rest of the process and be
    /// safe to read from any thread.
    pub unsafe fn from_raw(ptr: NonNull<c_void>) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(self) -> *const c_void {
        self.0.as_ptr()
    }
}

/// Module registry
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, CapabilityTable>,
}

impl ModuleRegistry {
    /// Create an empty module registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, returning the one it replaces
    pub fn register(&mut self, name: &str, table: CapabilityTable) -> Option<CapabilityTable> {
        self.modules.insert(name.to_string(), table)
    }

    /// Get a table by name. A miss never creates an entry.
    pub fn get(&self, name: &str) -> Option<CapabilityTable> {
        self.modules.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Registered module names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

static GLOBAL: OnceCell<ModuleRegistry> = OnceCell::new();

/// Install the process-wide registry. Succeeds once.
pub fn install(registry: ModuleRegistry) -> Result<(), HostError> {
    let count = registry.len();
    GLOBAL
        .set(registry)
        .map_err(|_| HostError::AlreadyInstalled)?;
    tracing::info!(target: "host", "Installed module registry with {} modules", count);
    Ok(())
}

/// The process-wide registry, if installed
pub fn global() -> Option<&'static ModuleRegistry> {
    GLOBAL.get()
}

/// Look up a table in the process-wide registry
pub fn require(name: &str) -> Option<CapabilityTable> {
    let Some(registry) = global() else {
        tracing::warn!(target: "host", "require({:?}) before the module registry was installed", name);
        return None;
    };
    let table = registry.get(name);
    if table.is_none() {
        cs_core::host_debug!("require({:?}): no such module", name);
    }
    table
}
