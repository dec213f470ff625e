//! Script-facing host API
//!
//! C entry points the engine injects into every session. Scripts declare
//! them as:
//!
//! ```c
//! void* require(const char* name);
//! void* resolver(const char* library, const char* function);
//! ```
//!
//! Both return null on a miss; the script must check before calling through
//! the result.

use std::ffi::CStr;
use std::ptr;

use libc::{c_char, c_void};

use crate::{registry, resolver as native};

pub const REQUIRE_SYMBOL: &str = "require";
pub const RESOLVER_SYMBOL: &str = "resolver";

/// `require(name)`: capability table registered under `name`
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
pub unsafe extern "C" fn require(name: *const c_char) -> *const c_void {
    let Some(name) = str_arg(name) else {
        return ptr::null();
    };
    registry::require(name).map_or(ptr::null(), |table| table.as_ptr())
}

/// `resolver(library, function)`: address of a native export
///
/// # Safety
///
/// Both arguments must be null or NUL-terminated strings.
pub unsafe extern "C" fn resolver(library: *const c_char, function: *const c_char) -> *mut c_void {
    let (Some(library), Some(function)) = (str_arg(library), str_arg(function)) else {
        return ptr::null_mut();
    };
    native::resolve(library, function).map_or(ptr::null_mut(), |address| address.as_ptr())
}

/// Name/address pairs for every host API entry point
pub fn host_symbols() -> [(&'static str, *const c_void); 2] {
    [
        (REQUIRE_SYMBOL, require as *const c_void),
        (RESOLVER_SYMBOL, resolver as *const c_void),
    ]
}

unsafe fn str_arg<'a>(arg: *const c_char) -> Option<&'a str> {
    if arg.is_null() {
        return None;
    }
    CStr::from_ptr(arg).to_str().ok()
}
