//! Test helpers for host tests

use crate::executor::compile;
use crate::host::{BoundFunction, HostValue, Runtime};

pub fn bind(runtime: &Runtime, source: &str) -> BoundFunction {
    let prototype =
        compile("test.editor_script", source).unwrap_or_else(|e| panic!("compile failed: {}", e));
    runtime.bind(&prototype).expect("bind failed")
}

/// Run a chunk's body as an immediate call
pub fn eval(runtime: &Runtime, source: &str) -> HostValue {
    let f = bind(runtime, source);
    runtime
        .invoke_immediate(&f, vec![], None)
        .unwrap_or_else(|e| panic!("script failed: {}", e))
}
