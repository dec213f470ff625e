//! In-memory C compile-and-run engine
//!
//! ```no_run
//! use cs_core::Config;
//! use cs_engine::Engine;
//!
//! let mut engine = Engine::new(Config::default())?;
//! let sum: i32 = unsafe {
//!     engine.run_string("int add(int a, int b) { return a + b; }", "add", (2, 3))?
//! };
//! assert_eq!(sum, 5);
//! # Ok::<(), cs_core::EngineError>(())
//! ```

pub mod engine;
pub mod invoke;

pub use engine::{Engine, SessionState};
pub use invoke::{CArgs, CReturn, CValue, Function};
