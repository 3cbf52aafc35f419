//! Test helpers for executor tests
//!
//! Compile a chunk, run its body against fresh globals and hand back the
//! outcome.

use crate::executor::{
    compile, main_closure, new_globals, CallMode, CompileError, Execution, Globals, Outcome,
    RuntimeError, Val,
};

pub const CHUNK: &str = "test.editor_script";

/// Compile `source` and create an execution of its body
pub fn build_execution(source: &str) -> Execution {
    let prototype = compile(CHUNK, source).unwrap_or_else(|e| panic!("compile failed: {}", e));
    Execution::new(main_closure(&prototype), vec![], CallMode::Immediate)
}

/// Run a script that must not call host functions
pub fn run_with(source: &str, globals: &mut Globals) -> Result<Val, RuntimeError> {
    let mut execution = build_execution(source);
    match execution.run(globals) {
        Outcome::Returned(v) => Ok(v),
        Outcome::Threw(e) => Err(e),
        Outcome::HostCall { func, .. } => panic!("unexpected host call {:?}", func),
    }
}

pub fn run(source: &str) -> Result<Val, RuntimeError> {
    run_with(source, &mut new_globals())
}

/// Run a script that must return normally
pub fn run_ok(source: &str) -> Val {
    run(source).unwrap_or_else(|e| panic!("script failed: {}", e))
}

pub fn compile_err(source: &str) -> CompileError {
    match compile(CHUNK, source) {
        Ok(_) => panic!("expected a compile error"),
        Err(e) => e,
    }
}

pub fn items(v: &Val) -> Vec<Val> {
    let Val::List(items) = v else {
        panic!("expected a list, got {:?}", v);
    };
    items.lock().clone()
}
