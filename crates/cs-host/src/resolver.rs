//! Native symbol resolver
//!
//! Finds a function exported by a shared library, loading the library when
//! the process does not have it yet. Nothing is cached here; the platform
//! loader already tracks what is loaded.
//!
//! A library this resolver had to load is never unloaded, so addresses taken
//! from it stay valid for the life of the process. A library that was
//! already mapped keeps whatever lifetime its existing owner gives it; the
//! reference taken for the lookup is released again.
//!
//! The returned address carries no type information. Whoever calls through
//! it must know the real signature.

use std::ptr::NonNull;

use cs_core::error::HostError;
use libc::c_void;
use libloading::os::unix::Library;

/// Resolve `function` in `library`, `None` on any failure
pub fn resolve(library: &str, function: &str) -> Option<NonNull<c_void>> {
    match resolve_symbol(library, function) {
        Ok(address) => Some(address),
        Err(e) => {
            cs_core::host_debug!("{}", e);
            None
        }
    }
}

/// Resolve `function` in `library`, reporting why it failed
pub fn resolve_symbol(library: &str, function: &str) -> Result<NonNull<c_void>, HostError> {
    if library.contains('\0') {
        return Err(HostError::InvalidName(library.to_string()));
    }
    if function.is_empty() || function.contains('\0') {
        return Err(HostError::InvalidName(function.to_string()));
    }

    let (handle, fresh) = open_library(library)?;

    let lookup_error = |reason: String| HostError::SymbolLookup {
        library: library.to_string(),
        function: function.to_string(),
        reason,
    };

    // SAFETY: the symbol is read as an untyped address, never called here.
    let address = unsafe { handle.get::<*mut c_void>(function.as_bytes()) }
        .map(|symbol| *symbol)
        .map_err(|e| lookup_error(e.to_string()))?;
    let address = NonNull::new(address).ok_or_else(|| lookup_error("null address".to_string()))?;

    if fresh {
        let _ = handle.into_raw();
    }

    cs_core::host_debug!("resolved {}!{} = {:p}", library, function, address);
    Ok(address)
}

/// Open `name`, reporting whether this call mapped it
fn open_library(name: &str) -> Result<(Library, bool), HostError> {
    // SAFETY: RTLD_NOLOAD never runs initializers; it only bumps the refcount
    // of a module that is already mapped.
    if let Ok(handle) = unsafe { Library::open(Some(name), libc::RTLD_NOLOAD | libc::RTLD_LAZY) } {
        return Ok((handle, false));
    }
    // SAFETY: loading runs the library's initializers. Scripts asking for a
    // library are trusted like natively linked code.
    let handle = unsafe { Library::open(Some(name), libc::RTLD_NOW) }.map_err(|e| HostError::LibraryLoad {
        library: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok((handle, true))
}
