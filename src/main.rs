//! CScripter - compile and run a C script in memory
//!
//! Main entry point for the demonstration driver.

use std::env;
use std::ffi::{c_char, c_void, CString};
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use cs_core::config::Config;
use cs_engine::Engine;
use cs_host::{registry, CapabilityTable, ModuleRegistry};

/// Capability table handed out as `require("test_module")`
#[repr(C)]
struct TestModule {
    print: extern "C" fn(),
}

extern "C" fn test_module_print() {
    println!("hello from test_module");
}

static TEST_MODULE: TestModule = TestModule {
    print: test_module_print,
};

extern "C" fn invoke_something(amount: i32) {
    for _ in 0..amount {
        println!("invoked something");
    }
}

fn main() -> Result<()> {
    let config = Config::load().unwrap_or_default();
    cs_core::logging::init(&config);

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <script.c> [entry] [script args...]", args[0]);
        std::process::exit(1);
    }

    let script = PathBuf::from(&args[1]);
    let entry = args.get(2).map(String::as_str).unwrap_or("main");

    let mut modules = ModuleRegistry::new();
    modules.register("test_module", CapabilityTable::new(&TEST_MODULE));
    registry::install(modules)?;

    let mut engine = Engine::new(config).context("Failed to start the compile engine")?;
    engine.add_symbol("invoke_something", invoke_something as *const c_void)?;

    // argv[0] is the script, followed by anything after the entry name
    let script_args = std::iter::once(args[1].as_str()).chain(args.iter().skip(3).map(String::as_str));
    let c_args = script_args
        .map(CString::new)
        .collect::<Result<Vec<_>, _>>()
        .context("Script argument contains a NUL byte")?;
    let mut argv: Vec<*mut c_char> = c_args.iter().map(|arg| arg.as_ptr() as *mut c_char).collect();
    let argc = argv.len() as i32;
    argv.push(std::ptr::null_mut());

    tracing::info!("Running {} from {}", entry, script.display());

    // SAFETY: the entry point is declared `int entry(int, char **)` by
    // convention for this driver.
    let code: i32 = unsafe { engine.run_file(&script, entry, (argc, argv.as_mut_ptr())) }
        .with_context(|| format!("Failed to run {}", script.display()))?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(engine.captured_output())?;
    stdout.flush()?;

    tracing::info!("{} returned {}", entry, code);
    std::process::exit(code);
}
