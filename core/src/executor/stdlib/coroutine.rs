//! Script coroutines
//!
//! These only describe the request; the VM moves fibers between the
//! coroutine object and its running chain.

use std::sync::Arc;

use parking_lot::Mutex;

use super::super::types::Val;
use super::super::vm::Coroutine;
use super::{arg, NativeCallResult, NativeResult};

pub fn create(args: &[Val]) -> Result<Val, String> {
    match args.first() {
        Some(body) if body.is_callable() => Ok(Val::Coroutine(Arc::new(Mutex::new(
            Coroutine::new(body.clone()),
        )))),
        other => Err(format!(
            "bad argument #1 to 'coroutine.create' (function expected, got {})",
            other.map(Val::type_name).unwrap_or("no value")
        )),
    }
}

pub fn resume(mut args: Vec<Val>) -> NativeCallResult {
    let first = if args.is_empty() {
        Val::Null
    } else {
        args.remove(0)
    };
    match first {
        Val::Coroutine(co) => Ok(NativeResult::Resume { co, args }),
        other => Err(format!(
            "bad argument #1 to 'coroutine.resume' (coroutine expected, got {})",
            other.type_name()
        )),
    }
}

pub fn yield_value(args: Vec<Val>) -> NativeResult {
    NativeResult::Yield(args.into_iter().next().unwrap_or(Val::Null))
}

pub fn status(args: &[Val]) -> Result<Val, String> {
    match arg(args, 0) {
        Val::Coroutine(co) => Ok(Val::str(co.lock().status())),
        other => Err(format!(
            "bad argument #1 to 'coroutine.status' (coroutine expected, got {})",
            other.type_name()
        )),
    }
}
