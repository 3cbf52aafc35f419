//! Test helpers for dispatcher tests
//!
//! A runtime with a few suspendable host functions:
//! - `now(v)` settles before returning
//! - `later(v, ms)` settles from another thread after `ms` milliseconds
//! - `fail_now(msg)` / `fail_later(msg)` fail the same two ways
//! - `lost()` drops its resolver

use std::thread;
use std::time::Duration;

use crate::deferred::{self, Deferred};
use crate::error::HostError;
use crate::executor::compile;
use crate::host::{BoundFunction, HostFunction, HostValue, Runtime, RuntimeBuilder};

pub fn bind(runtime: &Runtime, source: &str) -> BoundFunction {
    let prototype =
        compile("test.editor_script", source).unwrap_or_else(|e| panic!("compile failed: {}", e));
    runtime.bind(&prototype).expect("bind failed")
}

pub fn eval(runtime: &Runtime, source: &str) -> HostValue {
    let f = bind(runtime, source);
    runtime
        .invoke_immediate(&f, vec![], None)
        .unwrap_or_else(|e| panic!("script failed: {}", e))
}

fn arg(args: &[HostValue], index: usize) -> HostValue {
    args.get(index).cloned().unwrap_or(HostValue::Null)
}

fn message(args: &[HostValue]) -> String {
    arg(args, 0).to_string()
}

/// Settle `deferred`'s resolver from a new thread after `delay`
fn settle_later(delay: Duration, result: Result<HostValue, HostError>) -> Deferred<HostValue, HostError> {
    let (resolver, deferred) = deferred::pending();
    thread::spawn(move || {
        thread::sleep(delay);
        resolver.resolve(result);
    });
    deferred
}

pub fn suspending_functions(builder: RuntimeBuilder) -> RuntimeBuilder {
    builder
        .function(
            "now",
            HostFunction::suspendable(|_ctx, args| Deferred::completed(arg(&args, 0))),
        )
        .function(
            "later",
            HostFunction::suspendable(|_ctx, args| {
                let ms = arg(&args, 1).as_f64().unwrap_or(10.0) as u64;
                settle_later(Duration::from_millis(ms), Ok(arg(&args, 0)))
            }),
        )
        .function(
            "fail_now",
            HostFunction::suspendable(|_ctx, args| Deferred::failed(HostError::new(message(&args)))),
        )
        .function(
            "fail_later",
            HostFunction::suspendable(|_ctx, args| {
                settle_later(Duration::from_millis(10), Err(HostError::new(message(&args))))
            }),
        )
        .function(
            "lost",
            HostFunction::suspendable(|_ctx, _args| {
                let (_resolver, deferred) = deferred::pending();
                deferred
            }),
        )
}

pub fn suspending_runtime() -> Runtime {
    suspending_functions(Runtime::builder())
        .build()
        .expect("runtime build failed")
}
