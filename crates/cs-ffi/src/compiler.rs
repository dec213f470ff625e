//! Compiler library interface
//!
//! `libtcc` is opened at run time, so the workspace builds on machines
//! without it and the host can pick a specific build through configuration.

use std::path::{Path, PathBuf};

use cs_core::config::CompilerConfig;
use cs_core::error::EngineError;
use libloading::Library;

use crate::types::*;

/// Entry points resolved from the compiler library
#[derive(Clone, Copy)]
pub struct TccApi {
    pub new: TccNewFn,
    pub delete: TccDeleteFn,
    pub set_lib_path: TccSetLibPathFn,
    pub set_error_func: TccSetErrorFuncFn,
    pub set_options: TccSetOptionsFn,
    pub add_include_path: TccAddPathFn,
    pub add_library_path: TccAddPathFn,
    pub add_library: TccAddLibraryFn,
    pub define_symbol: TccDefineSymbolFn,
    pub set_output_type: TccSetOutputTypeFn,
    pub compile_string: TccCompileStringFn,
    pub add_symbol: TccAddSymbolFn,
    pub relocate: TccRelocateFn,
    pub get_symbol: TccGetSymbolFn,
}

/// Loaded compiler library
///
/// Shared between engines; every [`Session`](crate::Session) keeps it alive.
pub struct Compiler {
    api: TccApi,
    path: PathBuf,
    // Must outlive every function pointer in `api`
    _library: Library,
}

impl Compiler {
    /// Load the first compiler library that opens from the configured candidates
    pub fn load(config: &CompilerConfig) -> Result<Self, EngineError> {
        let mut tried = Vec::new();
        for candidate in config.library_candidates() {
            match Self::open(&candidate) {
                Ok(compiler) => return Ok(compiler),
                Err(e) => {
                    cs_core::compiler_trace!("{} unusable: {}", candidate.display(), e);
                    tried.push(candidate.display().to_string());
                }
            }
        }
        Err(EngineError::LibraryNotFound {
            tried: tried.join(", "),
        })
    }

    /// Open a compiler library at a specific path
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        // SAFETY: libtcc has no library constructors with preconditions.
        let library = unsafe { Library::new(path) }.map_err(|e| EngineError::LibraryNotFound {
            tried: format!("{} ({})", path.display(), e),
        })?;

        // SAFETY: the types in `types.rs` mirror the declarations in libtcc.h.
        let api = unsafe {
            TccApi {
                new: export(&library, "tcc_new")?,
                delete: export(&library, "tcc_delete")?,
                set_lib_path: export(&library, "tcc_set_lib_path")?,
                set_error_func: export(&library, "tcc_set_error_func")?,
                set_options: export(&library, "tcc_set_options")?,
                add_include_path: export(&library, "tcc_add_include_path")?,
                add_library_path: export(&library, "tcc_add_library_path")?,
                add_library: export(&library, "tcc_add_library")?,
                define_symbol: export(&library, "tcc_define_symbol")?,
                set_output_type: export(&library, "tcc_set_output_type")?,
                compile_string: export(&library, "tcc_compile_string")?,
                add_symbol: export(&library, "tcc_add_symbol")?,
                relocate: export(&library, "tcc_relocate")?,
                get_symbol: export(&library, "tcc_get_symbol")?,
            }
        };

        tracing::info!("Loaded compiler library {}", path.display());
        Ok(Self {
            api,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    /// Resolved entry points
    pub fn api(&self) -> &TccApi {
        &self.api
    }

    /// Path the library was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler").field("path", &self.path).finish()
    }
}

unsafe fn export<T: Copy>(library: &Library, name: &str) -> Result<T, EngineError> {
    let symbol = library
        .get::<T>(name.as_bytes())
        .map_err(|_| EngineError::MissingExport(name.to_string()))?;
    Ok(*symbol)
}
