//! Engine lifecycle and invocation tests
//!
//! Every run redirects process stdout, so these tests are serialized.

mod common;

use std::ffi::CString;
use std::io::Write;
use std::sync::Arc;

use common::engine;
use cs_core::{Config, EngineError};
use cs_engine::{Engine, SessionState};
use libc::{c_char, c_void};
use serial_test::serial;

const ADD_SOURCE: &str = r#"
int add(int a, int b) { return a + b; }
int run(void) { return add(10, 10); }
"#;

extern "C" fn host_twice(value: i32) -> i32 {
    value * 2
}

#[test]
#[serial]
fn test_run_string_returns_native_value() {
    let Some(mut engine) = engine() else { return };

    let value: i32 = unsafe { engine.run_string(ADD_SOURCE, "run", ()) }.unwrap();
    assert_eq!(value, 20);

    let value: i32 = unsafe { engine.run_string(ADD_SOURCE, "add", (-3, 45)) }.unwrap();
    assert_eq!(value, 42);
}

#[test]
#[serial]
fn test_mixed_argument_types() {
    let Some(mut engine) = engine() else { return };

    let source = r#"
        double scale(double x, int k) { return x * k; }
        long long widen(int a, long long b) { return a + b; }
        int length(const char *s) { int n = 0; while (s[n]) n++; return n; }
        void store(int *slot, int value) { *slot = value; }
    "#;

    let value: f64 = unsafe { engine.run_string(source, "scale", (2.5f64, 4i32)) }.unwrap();
    assert_eq!(value, 10.0);

    let value: i64 = unsafe { engine.run_string(source, "widen", (1i32, 1i64 << 40)) }.unwrap();
    assert_eq!(value, (1i64 << 40) + 1);

    let text = CString::new("compile-and-run").unwrap();
    let value: i32 = unsafe { engine.run_string(source, "length", (text.as_ptr(),)) }.unwrap();
    assert_eq!(value, 15);

    let mut slot = 0i32;
    unsafe { engine.run_string::<(), _>(source, "store", (&mut slot as *mut i32, 99i32)) }.unwrap();
    assert_eq!(slot, 99);
}

#[test]
#[serial]
fn test_void_entry_reports_success() {
    let Some(mut engine) = engine() else { return };
    let result: Result<(), _> = unsafe { engine.run_string("void e(void) {}", "e", ()) };
    assert!(result.is_ok());
}

#[test]
#[serial]
fn test_missing_entry_is_an_error() {
    let Some(mut engine) = engine() else { return };

    let result: Result<(), _> = unsafe { engine.run_string("void e(void) {}", "missing_entry", ()) };
    match result {
        Err(EngineError::SymbolNotFound(name)) => assert_eq!(name, "missing_entry"),
        other => panic!("expected SymbolNotFound, got {:?}", other),
    }
    assert_eq!(engine.state(), SessionState::Ready);

    let value: i32 = unsafe { engine.run_string(ADD_SOURCE, "run", ()) }.unwrap();
    assert_eq!(value, 20);
}

#[test]
#[serial]
fn test_compile_failure_leaves_engine_usable() {
    let Some(mut engine) = engine() else { return };

    let result: Result<i32, _> = unsafe { engine.run_string("int broken( { return 1 }", "broken", ()) };
    match result {
        Err(EngineError::Compile(message)) => assert!(!message.is_empty()),
        other => panic!("expected a compile error, got {:?}", other),
    }
    assert!(!engine.diagnostics().is_empty());
    assert_eq!(engine.state(), SessionState::Ready);

    let value: i32 = unsafe { engine.run_string(ADD_SOURCE, "run", ()) }.unwrap();
    assert_eq!(value, 20);
}

#[test]
#[serial]
fn test_source_with_nul_byte() {
    let Some(mut engine) = engine() else { return };
    let result: Result<i32, _> = unsafe { engine.run_string("int f(void) { return 1; }\0", "f", ()) };
    assert!(matches!(result, Err(EngineError::Compile(_))));
}

#[test]
#[serial]
fn test_injected_symbols_do_not_survive_a_run() {
    let Some(mut engine) = engine() else { return };

    let source = r#"
        int twice(int value);
        int run(void) { return twice(21); }
    "#;

    engine.add_symbol("twice", host_twice as *const c_void).unwrap();
    assert!(engine.symbols().contains(&"twice"));

    let value: i32 = unsafe { engine.run_string(source, "run", ()) }.unwrap();
    assert_eq!(value, 42);
    assert!(!engine.symbols().contains(&"twice"));

    // Without re-registration the reference cannot be resolved
    let result: Result<i32, _> = unsafe { engine.run_string(source, "run", ()) };
    assert!(matches!(result, Err(EngineError::Relocate(_))));

    engine.add_symbol("twice", host_twice as *const c_void).unwrap();
    let value: i32 = unsafe { engine.run_string(source, "run", ()) }.unwrap();
    assert_eq!(value, 42);
}

#[test]
#[serial]
fn test_injected_symbols_reset_after_a_failed_compile() {
    let Some(mut engine) = engine() else { return };

    engine.add_symbol("twice", host_twice as *const c_void).unwrap();
    let result: Result<i32, _> = unsafe { engine.run_string("int broken( {", "broken", ()) };
    assert!(matches!(result, Err(EngineError::Compile(_))));
    assert!(!engine.symbols().contains(&"twice"));

    let source = "int twice(int value);\nint run(void) { return twice(4); }\n";
    let result: Result<i32, _> = unsafe { engine.run_string(source, "run", ()) };
    assert!(matches!(result, Err(EngineError::Relocate(_))));
}

#[test]
#[serial]
fn test_injected_symbols_reset_after_a_missing_entry() {
    let Some(mut engine) = engine() else { return };

    let source = "int twice(int value);\nint run(void) { return twice(4); }\n";
    engine.add_symbol("twice", host_twice as *const c_void).unwrap();
    let result: Result<i32, _> = unsafe { engine.run_string(source, "not_the_entry", ()) };
    assert!(matches!(result, Err(EngineError::SymbolNotFound(_))));
    assert!(!engine.symbols().contains(&"twice"));

    let result: Result<i32, _> = unsafe { engine.run_string(source, "run", ()) };
    assert!(matches!(result, Err(EngineError::Relocate(_))));
}

#[test]
fn test_explicit_library_is_never_skipped() {
    let mut config = Config::default();
    config.compiler.library = Some("/nonexistent/cscripter/libtcc.so".into());
    assert!(!common::skip_allowed(&config));

    if std::env::var_os(cs_core::config::LIBRARY_ENV).is_some() {
        return;
    }
    match Engine::new(config) {
        Err(EngineError::LibraryNotFound { tried }) => assert!(tried.contains("/nonexistent/cscripter/libtcc.so")),
        other => panic!("expected LibraryNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
#[serial]
fn test_session_state_machine() {
    let Some(loaded) = engine() else { return };
    let compiler = Arc::clone(loaded.compiler());
    drop(loaded);

    let mut engine = Engine::with_compiler(compiler, Config::default());
    assert_eq!(engine.state(), SessionState::Uninitialized);
    assert!(matches!(
        engine.add_symbol("twice", host_twice as *const c_void),
        Err(EngineError::NoSession)
    ));
    assert!(matches!(engine.compile_string("int x;"), Err(EngineError::NoSession)));

    engine.init().unwrap();
    assert_eq!(engine.state(), SessionState::Ready);
    assert!(engine.symbols().contains(&"require"));
    assert!(engine.symbols().contains(&"resolver"));

    engine.compile_string("int mul(int a, int b) { return a * b; }").unwrap();
    assert_eq!(engine.state(), SessionState::Compiled);
    assert!(matches!(engine.compile_string("int y;"), Err(EngineError::ProgramLoaded)));
    assert!(matches!(
        engine.add_symbol("twice", host_twice as *const c_void),
        Err(EngineError::ProgramLoaded)
    ));

    {
        let mul = engine.get_symbol::<(i32, i32), i32>("mul").unwrap().unwrap();
        assert_eq!(unsafe { mul.call((6, 7)) }, 42);
    }
    assert_eq!(engine.state(), SessionState::Linked);

    // Relocation already happened; later lookups reuse it
    assert!(engine.get_symbol::<(), ()>("not_there").unwrap().is_none());
    let mul = engine.get_symbol::<(i32, i32), i32>("mul").unwrap().unwrap();
    assert_eq!(unsafe { mul.call((-4, 5)) }, -20);

    engine.reinit().unwrap();
    assert_eq!(engine.state(), SessionState::Ready);

    engine.destroy();
    engine.destroy();
    assert_eq!(engine.state(), SessionState::Uninitialized);

    // A run brings up a session on demand
    let value: i32 = unsafe { engine.run_string(ADD_SOURCE, "run", ()) }.unwrap();
    assert_eq!(value, 20);
    assert_eq!(engine.state(), SessionState::Ready);
}

#[test]
#[serial]
fn test_get_symbol_before_compile() {
    let Some(mut engine) = engine() else { return };
    assert!(matches!(
        engine.get_symbol::<(), i32>("run"),
        Err(EngineError::NotCompiled)
    ));
}

#[test]
#[serial]
fn test_run_file() {
    let Some(mut engine) = engine() else { return };

    let mut script = tempfile::Builder::new().suffix(".c").tempfile().unwrap();
    script.write_all(ADD_SOURCE.as_bytes()).unwrap();
    script.flush().unwrap();

    let value: i32 = unsafe { engine.run_file(script.path(), "run", ()) }.unwrap();
    assert_eq!(value, 20);

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.c");
    let result: Result<i32, _> = unsafe { engine.run_file(&missing, "run", ()) };
    match result {
        Err(EngineError::Io { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected an I/O error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_compile_file_then_lookup() {
    let Some(mut engine) = engine() else { return };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("negate.c");
    std::fs::write(&path, "int negate(int v) { return -v; }\n").unwrap();

    engine.compile_file(&path).unwrap();
    let negate = engine.get_symbol::<(i32,), i32>("negate").unwrap().unwrap();
    assert_eq!(unsafe { negate.call((17,)) }, -17);
}

#[test]
#[serial]
fn test_defines_from_config() {
    let mut config = Config::default();
    config.compiler.defines.insert("ANSWER".to_string(), "42".to_string());
    config.compiler.defines.insert("ENABLED".to_string(), String::new());
    let Some(mut engine) = common::engine_with(config) else { return };

    let source = r#"
        int run(void) {
        #if ENABLED
            return ANSWER;
        #else
            return 0;
        #endif
        }
    "#;
    let value: i32 = unsafe { engine.run_string(source, "run", ()) }.unwrap();
    assert_eq!(value, 42);
}

#[test]
#[serial]
fn test_host_api_can_be_disabled() {
    let mut config = Config::default();
    config.engine.inject_host_api = false;
    let Some(engine) = common::engine_with(config) else { return };
    assert!(engine.symbols().is_empty());
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[test]
#[serial]
fn test_script_uses_require_and_resolver() {
    use cs_host::{registry, CapabilityTable, ModuleRegistry};

    #[repr(C)]
    struct AnswerModule {
        answer: extern "C" fn() -> i32,
        name: extern "C" fn() -> *const c_char,
    }

    extern "C" fn answer() -> i32 {
        42
    }

    extern "C" fn name() -> *const c_char {
        c"answers".as_ptr()
    }

    static ANSWERS: AnswerModule = AnswerModule { answer, name };

    let Some(mut engine) = engine() else { return };

    let mut modules = ModuleRegistry::new();
    modules.register("answers", CapabilityTable::new(&ANSWERS));
    registry::install(modules).unwrap();

    let source = r#"
        void* require(const char* name);
        void* resolver(const char* library, const char* function);

        typedef struct {
            int (*answer)(void);
            const char* (*name)(void);
        } answer_module;

        int run(void) {
            answer_module* mod = (answer_module*)require("answers");
            if (!mod) return -1;
            if (require("missing") != 0) return -2;

            int (*abs_fn)(int) = (int (*)(int))resolver("libc.so.6", "abs");
            if (!abs_fn) return -3;
            if (resolver("libcscripter-missing.so", "abs") != 0) return -4;

            const char* n = mod->name();
            if (n[0] != 'a') return -5;

            return mod->answer() + abs_fn(-8);
        }
    "#;

    let value: i32 = unsafe { engine.run_string(source, "run", ()) }.unwrap();
    assert_eq!(value, 50);
}
