//! Shared types for FFI

use libc::{c_char, c_int, c_void};

/// Compiler state handle (opaque, owned by libtcc)
#[repr(C)]
pub struct TccState {
    _private: [u8; 0],
}

/// Output to memory, runnable in-process
pub const TCC_OUTPUT_MEMORY: c_int = 1;

/// Let `tcc_relocate` allocate and own the executable image.
///
/// Newer libtcc releases dropped the second parameter; passing it anyway is
/// harmless under the C calling convention.
pub const TCC_RELOCATE_AUTO: *mut c_void = 1 as *mut c_void;

/// Diagnostic callback
pub type TccErrorFunc = unsafe extern "C" fn(opaque: *mut c_void, msg: *const c_char);

pub type TccNewFn = unsafe extern "C" fn() -> *mut TccState;
pub type TccDeleteFn = unsafe extern "C" fn(s: *mut TccState);
pub type TccSetLibPathFn = unsafe extern "C" fn(s: *mut TccState, path: *const c_char);
pub type TccSetErrorFuncFn =
    unsafe extern "C" fn(s: *mut TccState, opaque: *mut c_void, func: Option<TccErrorFunc>);
// Declared without a return value: older releases return void
pub type TccSetOptionsFn = unsafe extern "C" fn(s: *mut TccState, opts: *const c_char);
pub type TccAddPathFn = unsafe extern "C" fn(s: *mut TccState, path: *const c_char) -> c_int;
pub type TccAddLibraryFn = unsafe extern "C" fn(s: *mut TccState, name: *const c_char) -> c_int;
pub type TccDefineSymbolFn =
    unsafe extern "C" fn(s: *mut TccState, sym: *const c_char, value: *const c_char);
pub type TccSetOutputTypeFn = unsafe extern "C" fn(s: *mut TccState, output_type: c_int) -> c_int;
pub type TccCompileStringFn = unsafe extern "C" fn(s: *mut TccState, buf: *const c_char) -> c_int;
pub type TccAddSymbolFn =
    unsafe extern "C" fn(s: *mut TccState, name: *const c_char, val: *const c_void) -> c_int;
pub type TccRelocateFn = unsafe extern "C" fn(s: *mut TccState, ptr: *mut c_void) -> c_int;
pub type TccGetSymbolFn =
    unsafe extern "C" fn(s: *mut TccState, name: *const c_char) -> *mut c_void;
