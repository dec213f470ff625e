//! Compiler session
//!
//! Safe owner of one `TCCState`. A session accepts one program, relocates it
//! at most once and frees the executable image when dropped.

use std::collections::BTreeMap;
use std::ffi::{CStr, CString};
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use cs_core::error::EngineError;
use libc::{c_char, c_void};
use parking_lot::Mutex;

use crate::compiler::{Compiler, TccApi};
use crate::types::*;

/// One live compiler session
pub struct Session {
    compiler: Arc<Compiler>,
    state: NonNull<TccState>,
    /// Receives compiler diagnostics; boxed so its address stays stable
    diagnostics: Box<Mutex<Vec<String>>>,
    /// Host symbols injected into this session (name -> address)
    symbols: BTreeMap<String, usize>,
    compiled: bool,
    relocated: bool,
}

impl Session {
    /// Create a new session with in-memory output
    pub fn new(compiler: Arc<Compiler>) -> Result<Self, EngineError> {
        let api = *compiler.api();
        // SAFETY: tcc_new has no preconditions.
        let state = NonNull::new(unsafe { (api.new)() }).ok_or(EngineError::SessionCreation)?;
        let diagnostics = Box::new(Mutex::new(Vec::new()));

        // SAFETY: the sink is owned by the session and outlives `state`.
        unsafe {
            (api.set_error_func)(
                state.as_ptr(),
                &*diagnostics as *const Mutex<Vec<String>> as *mut c_void,
                Some(on_diagnostic),
            );
        }

        cs_core::compiler_trace!("Created session {:p}", state.as_ptr());
        Ok(Self {
            compiler,
            state,
            diagnostics,
            symbols: BTreeMap::new(),
            compiled: false,
            relocated: false,
        })
    }

    fn api(&self) -> &TccApi {
        self.compiler.api()
    }

    /// Directory holding the compiler runtime (`libtcc1.a`, bundled headers).
    /// Must be set before [`Session::set_output_memory`].
    pub fn set_runtime_path(&mut self, path: &Path) -> Result<(), EngineError> {
        let path = c_string(&path.to_string_lossy())?;
        // SAFETY: valid state and NUL-terminated string.
        unsafe { (self.api().set_lib_path)(self.state.as_ptr(), path.as_ptr()) };
        Ok(())
    }

    /// Pass command-line style options
    pub fn set_options(&mut self, options: &str) -> Result<(), EngineError> {
        let options = c_string(options)?;
        // SAFETY: valid state and NUL-terminated string.
        unsafe { (self.api().set_options)(self.state.as_ptr(), options.as_ptr()) };
        Ok(())
    }

    /// Compile into memory so the program can run in this process
    pub fn set_output_memory(&mut self) -> Result<(), EngineError> {
        // SAFETY: valid state.
        let rc = unsafe { (self.api().set_output_type)(self.state.as_ptr(), TCC_OUTPUT_MEMORY) };
        if rc < 0 {
            return Err(EngineError::SessionCreation);
        }
        Ok(())
    }

    pub fn add_include_path(&mut self, path: &Path) -> Result<(), EngineError> {
        let path = c_string(&path.to_string_lossy())?;
        // SAFETY: valid state and NUL-terminated string.
        unsafe { (self.api().add_include_path)(self.state.as_ptr(), path.as_ptr()) };
        Ok(())
    }

    pub fn add_library_path(&mut self, path: &Path) -> Result<(), EngineError> {
        let path = c_string(&path.to_string_lossy())?;
        // SAFETY: valid state and NUL-terminated string.
        unsafe { (self.api().add_library_path)(self.state.as_ptr(), path.as_ptr()) };
        Ok(())
    }

    /// Link a library by short name (`m` for libm)
    pub fn add_library(&mut self, name: &str) -> Result<(), EngineError> {
        let c_name = c_string(name)?;
        // SAFETY: valid state and NUL-terminated string.
        let rc = unsafe { (self.api().add_library)(self.state.as_ptr(), c_name.as_ptr()) };
        if rc < 0 {
            return Err(EngineError::Compile(self.failure_message(&format!(
                "library `{}` not found",
                name
            ))));
        }
        Ok(())
    }

    /// Define a preprocessor macro; an empty value defines it as `1`
    pub fn define(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        let c_name = c_string(name)?;
        let c_value = c_string(if value.is_empty() { "1" } else { value })?;
        // SAFETY: valid state and NUL-terminated strings.
        unsafe { (self.api().define_symbol)(self.state.as_ptr(), c_name.as_ptr(), c_value.as_ptr()) };
        Ok(())
    }

    /// Make a host address visible to compiled code under `name`
    pub fn add_symbol(&mut self, name: &str, address: *const c_void) -> Result<(), EngineError> {
        if self.compiled {
            return Err(EngineError::ProgramLoaded);
        }
        let c_name = c_string(name)?;
        // SAFETY: valid state; libtcc copies the name.
        let rc = unsafe { (self.api().add_symbol)(self.state.as_ptr(), c_name.as_ptr(), address) };
        if rc < 0 {
            return Err(EngineError::SymbolRejected(name.to_string()));
        }
        self.symbols.insert(name.to_string(), address as usize);
        cs_core::compiler_trace!("Injected {} = {:p}", name, address);
        Ok(())
    }

    /// Compile a translation unit
    pub fn compile(&mut self, source: &[u8]) -> Result<(), EngineError> {
        if self.compiled {
            return Err(EngineError::ProgramLoaded);
        }
        let source = CString::new(source).map_err(|e| {
            EngineError::Compile(format!("source contains a NUL byte at offset {}", e.nul_position()))
        })?;

        self.diagnostics.lock().clear();
        // SAFETY: valid state and NUL-terminated source.
        let rc = unsafe { (self.api().compile_string)(self.state.as_ptr(), source.as_ptr()) };
        if rc < 0 {
            return Err(EngineError::Compile(self.failure_message("unknown error")));
        }
        self.compiled = true;
        Ok(())
    }

    /// Finalize symbol references into addresses. Runs once per session.
    pub fn relocate(&mut self) -> Result<(), EngineError> {
        if !self.compiled {
            return Err(EngineError::NotCompiled);
        }
        if self.relocated {
            return Ok(());
        }
        // SAFETY: valid state holding a compiled program.
        let rc = unsafe { (self.api().relocate)(self.state.as_ptr(), TCC_RELOCATE_AUTO) };
        if rc < 0 {
            return Err(EngineError::Relocate(self.failure_message("unknown error")));
        }
        self.relocated = true;
        cs_core::compiler_debug!("Relocated session {:p}", self.state.as_ptr());
        Ok(())
    }

    /// Address of a symbol in the relocated program, relocating first if needed
    pub fn symbol(&mut self, name: &str) -> Result<Option<NonNull<c_void>>, EngineError> {
        self.relocate()?;
        let c_name = c_string(name)?;
        // SAFETY: valid, relocated state.
        let address = unsafe { (self.api().get_symbol)(self.state.as_ptr(), c_name.as_ptr()) };
        Ok(NonNull::new(address))
    }

    /// Injected symbols (name -> address)
    pub fn symbols(&self) -> &BTreeMap<String, usize> {
        &self.symbols
    }

    /// Diagnostics reported since the last compile
    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.lock().clone()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn is_relocated(&self) -> bool {
        self.relocated
    }

    fn failure_message(&self, fallback: &str) -> String {
        let diagnostics = self.diagnostics.lock();
        if diagnostics.is_empty() {
            fallback.to_string()
        } else {
            diagnostics.join("\n")
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // SAFETY: `state` came from tcc_new and is deleted exactly once.
        unsafe { (self.api().delete)(self.state.as_ptr()) };
        cs_core::compiler_trace!("Deleted session {:p}", self.state.as_ptr());
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("symbols", &self.symbols.keys().collect::<Vec<_>>())
            .field("compiled", &self.compiled)
            .field("relocated", &self.relocated)
            .finish()
    }
}

unsafe extern "C" fn on_diagnostic(opaque: *mut c_void, msg: *const c_char) {
    if opaque.is_null() || msg.is_null() {
        return;
    }
    let sink = &*(opaque as *const Mutex<Vec<String>>);
    let text = CStr::from_ptr(msg).to_string_lossy().into_owned();
    tracing::warn!(target: "compiler", "{}", text);
    sink.lock().push(text);
}

fn c_string(value: &str) -> Result<CString, EngineError> {
    CString::new(value).map_err(|_| EngineError::InvalidName(value.to_string()))
}
