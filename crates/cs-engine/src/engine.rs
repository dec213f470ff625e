//! Compilation/execution engine
//!
//! Owns one compiler session and drives compile -> inject -> resolve ->
//! invoke -> capture -> reset. Every `run_*` call ends with a fresh session,
//! so no program, injected symbol or relocation survives from one run to the
//! next.

use std::borrow::Cow;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use cs_capture::CaptureScope;
use cs_core::config::Config;
use cs_core::error::EngineError;
use cs_ffi::{Compiler, Session};
use cs_host::api;
use libc::c_void;

use crate::invoke::{CArgs, CReturn, Function};

pub type Result<T> = std::result::Result<T, EngineError>;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session exists
    Uninitialized,
    /// Session ready, nothing compiled
    Ready,
    /// Program compiled but not relocated
    Compiled,
    /// Program relocated; symbols can be called
    Linked,
}

/// Compile-and-run engine
pub struct Engine {
    compiler: Arc<Compiler>,
    config: Config,
    session: Option<Session>,
    /// Stdout of every run so far
    captured: Vec<u8>,
    /// Diagnostics of the most recent compile or relocation
    diagnostics: Vec<String>,
}

impl Engine {
    /// Load the configured compiler library and create a session
    pub fn new(config: Config) -> Result<Self> {
        let compiler = Arc::new(Compiler::load(&config.compiler)?);
        let mut engine = Self::with_compiler(compiler, config);
        engine.init()?;
        Ok(engine)
    }

    /// Create an engine on an already loaded compiler, without a session
    pub fn with_compiler(compiler: Arc<Compiler>, config: Config) -> Self {
        Self {
            compiler,
            config,
            session: None,
            captured: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Discard any session and create a fresh one
    ///
    /// On failure the engine is left without a session; `init` can be
    /// retried.
    pub fn init(&mut self) -> Result<()> {
        self.destroy();
        let mut session = Session::new(Arc::clone(&self.compiler))?;
        self.configure(&mut session)?;
        self.session = Some(session);
        cs_core::compiler_debug!("Session initialized");
        Ok(())
    }

    /// Apply compiler settings and the host API to a new session
    fn configure(&self, session: &mut Session) -> Result<()> {
        let settings = &self.config.compiler;
        if let Some(path) = &settings.runtime_path {
            session.set_runtime_path(path)?;
        }
        if !settings.options.trim().is_empty() {
            session.set_options(&settings.options)?;
        }
        session.set_output_memory()?;
        for path in &settings.include_paths {
            session.add_include_path(path)?;
        }
        for path in &settings.library_paths {
            session.add_library_path(path)?;
        }
        for (name, value) in &settings.defines {
            session.define(name, value)?;
        }
        for library in &settings.libraries {
            session.add_library(library)?;
        }
        if self.config.engine.inject_host_api {
            for (name, address) in api::host_symbols() {
                session.add_symbol(name, address)?;
            }
        }
        Ok(())
    }

    /// Release the current session. No-op without one.
    pub fn destroy(&mut self) {
        if self.session.take().is_some() {
            cs_core::compiler_debug!("Session destroyed");
        }
    }

    /// `destroy` followed by `init`
    pub fn reinit(&mut self) -> Result<()> {
        self.destroy();
        self.init()
    }

    /// Make a native function visible to the next program under `name`
    ///
    /// Must be called after `init`/`reinit` and before compiling; the table
    /// is discarded with the session.
    pub fn add_symbol(&mut self, name: &str, address: *const c_void) -> Result<()> {
        self.session_mut()?.add_symbol(name, address)
    }

    /// Compile C source into the current session
    pub fn compile_string(&mut self, source: &str) -> Result<()> {
        self.compile_bytes(source.as_bytes())
    }

    /// Compile a C source file into the current session
    pub fn compile_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let source = std::fs::read(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        cs_core::compiler_debug!("Read {} ({} bytes)", path.display(), source.len());
        self.compile_bytes(&source)
    }

    fn compile_bytes(&mut self, source: &[u8]) -> Result<()> {
        let session = self.session.as_mut().ok_or(EngineError::NoSession)?;
        let result = session.compile(source);
        self.diagnostics = session.diagnostics();
        result
    }

    /// Look up a function in the compiled program, relocating it first
    ///
    /// `Ok(None)` if the program has no such symbol.
    pub fn get_symbol<A: CArgs, R: CReturn>(&mut self, name: &str) -> Result<Option<Function<'_, A, R>>> {
        Ok(self.lookup(name)?.map(Function::new))
    }

    fn lookup(&mut self, name: &str) -> Result<Option<NonNull<c_void>>> {
        let session = self.session.as_mut().ok_or(EngineError::NoSession)?;
        let result = session.symbol(name);
        if let Err(EngineError::Relocate(_)) = &result {
            self.diagnostics = session.diagnostics();
        }
        result
    }

    /// Compile `source`, call `entry` with `args` and return its result
    ///
    /// Stdout written during the call is appended to the captured output.
    /// The session is reinitialized afterwards whether or not the run
    /// succeeded, so symbols added before this call are gone.
    ///
    /// # Safety
    ///
    /// `entry` must be defined in C as `R entry(A...)` with exactly these
    /// types. The compiled code runs with full native privileges.
    pub unsafe fn run_string<R: CReturn, A: CArgs>(&mut self, source: &str, entry: &str, args: A) -> Result<R> {
        let result = self
            .ensure_session()
            .and_then(|_| self.compile_string(source))
            .and_then(|_| self.invoke(entry, args));
        self.finish_run(result)
    }

    /// Like [`Engine::run_string`], reading the source from `path`
    ///
    /// # Safety
    ///
    /// Same contract as [`Engine::run_string`].
    pub unsafe fn run_file<R: CReturn, A: CArgs, P: AsRef<Path>>(
        &mut self,
        path: P,
        entry: &str,
        args: A,
    ) -> Result<R> {
        let result = self
            .ensure_session()
            .and_then(|_| self.compile_file(path))
            .and_then(|_| self.invoke(entry, args));
        self.finish_run(result)
    }

    unsafe fn invoke<R: CReturn, A: CArgs>(&mut self, entry: &str, args: A) -> Result<R> {
        let address = self
            .lookup(entry)?
            .ok_or_else(|| EngineError::SymbolNotFound(entry.to_string()))?;
        cs_core::compiler_debug!("Invoking {} at {:p} with {} arguments", entry, address, A::ARITY);

        if !self.config.engine.capture_output {
            return Ok(args.call(address));
        }

        let scope = CaptureScope::begin()?;
        let value = args.call(address);
        let output = scope.finish()?;
        self.captured.extend_from_slice(&output);
        Ok(value)
    }

    fn ensure_session(&mut self) -> Result<()> {
        if self.session.is_none() {
            self.init()?;
        }
        Ok(())
    }

    fn finish_run<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            tracing::debug!("Run failed: {}", e);
        }
        if let Err(e) = self.reinit() {
            // The next run retries init
            tracing::error!("Failed to reinitialize session: {}", e);
        }
        result
    }

    /// Everything captured so far, across runs
    pub fn captured_output(&self) -> &[u8] {
        &self.captured
    }

    /// Captured output as text, invalid UTF-8 replaced
    pub fn captured_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.captured)
    }

    pub fn clear_captured_output(&mut self) {
        self.captured.clear();
    }

    /// Diagnostics of the most recent compile or relocation
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Names of the symbols injected into the current session
    pub fn symbols(&self) -> Vec<&str> {
        self.session
            .as_ref()
            .map(|session| session.symbols().keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn state(&self) -> SessionState {
        match &self.session {
            None => SessionState::Uninitialized,
            Some(session) if session.is_relocated() => SessionState::Linked,
            Some(session) if session.is_compiled() => SessionState::Compiled,
            Some(_) => SessionState::Ready,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn compiler(&self) -> &Arc<Compiler> {
        &self.compiler
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(EngineError::NoSession)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("compiler", &self.compiler)
            .field("state", &self.state())
            .field("captured", &self.captured.len())
            .finish()
    }
}
