//! FFI bridge to the libtcc in-memory C compiler
//!
//! The library is opened at run time with `libloading`. [`Compiler`] holds
//! the resolved entry points, [`Session`] owns one compiler state.

pub mod compiler;
pub mod session;
pub mod types;

pub use compiler::{Compiler, TccApi};
pub use session::Session;
