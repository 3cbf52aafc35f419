//! Standard library function implementations
//!
//! This module contains all stdlib function implementations organized by category.
//! Host functions (including `print`) are not here: they belong to the runtime.

pub mod basic;
pub mod coroutine;
pub mod math;

use std::collections::BTreeMap;

use super::types::{CoroutineRef, NativeFn, Val};
use super::Globals;

/* ===================== Standard Library Function Types ===================== */

/// Standard library function identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdlibFunc {
    Pcall,
    Len,
    Type,
    ToString,
    Keys,
    Push,
    MathFloor,
    CoroutineCreate,
    CoroutineResume,
    CoroutineYield,
    CoroutineStatus,
}

impl StdlibFunc {
    pub fn name(&self) -> &'static str {
        match self {
            StdlibFunc::Pcall => "pcall",
            StdlibFunc::Len => "len",
            StdlibFunc::Type => "type",
            StdlibFunc::ToString => "tostring",
            StdlibFunc::Keys => "keys",
            StdlibFunc::Push => "push",
            StdlibFunc::MathFloor => "math.floor",
            StdlibFunc::CoroutineCreate => "coroutine.create",
            StdlibFunc::CoroutineResume => "coroutine.resume",
            StdlibFunc::CoroutineYield => "coroutine.yield",
            StdlibFunc::CoroutineStatus => "coroutine.status",
        }
    }
}

/// What the VM should do after a stdlib call
pub enum NativeResult {
    Value(Val),
    /// Call `callee(args)`, catching anything it throws
    Protected { callee: Val, args: Vec<Val> },
    Resume { co: CoroutineRef, args: Vec<Val> },
    Yield(Val),
}

pub type NativeCallResult = Result<NativeResult, String>;

/* ===================== Stdlib Dispatcher ===================== */

/// Call a standard library function with arguments
pub fn call_stdlib_func(func: StdlibFunc, args: Vec<Val>) -> NativeCallResult {
    match func {
        StdlibFunc::Pcall => basic::pcall(args),
        StdlibFunc::Len => basic::len(&args).map(NativeResult::Value),
        StdlibFunc::Type => basic::type_of(&args).map(NativeResult::Value),
        StdlibFunc::ToString => basic::to_string(&args).map(NativeResult::Value),
        StdlibFunc::Keys => basic::keys(&args).map(NativeResult::Value),
        StdlibFunc::Push => basic::push(&args).map(NativeResult::Value),
        StdlibFunc::MathFloor => math::floor(&args).map(NativeResult::Value),
        StdlibFunc::CoroutineCreate => coroutine::create(&args).map(NativeResult::Value),
        StdlibFunc::CoroutineResume => coroutine::resume(args),
        StdlibFunc::CoroutineYield => Ok(coroutine::yield_value(args)),
        StdlibFunc::CoroutineStatus => coroutine::status(&args).map(NativeResult::Value),
    }
}

/// First argument or null
pub(crate) fn arg(args: &[Val], index: usize) -> Val {
    args.get(index).cloned().unwrap_or(Val::Null)
}

/* ===================== Environment Injection ===================== */

fn native(func: StdlibFunc) -> Val {
    Val::NativeFunc(NativeFn::Stdlib(func))
}

/// Inject standard library functions and namespaces into a runtime's globals
pub fn inject_stdlib(globals: &mut Globals) {
    for func in [
        StdlibFunc::Pcall,
        StdlibFunc::Len,
        StdlibFunc::Type,
        StdlibFunc::ToString,
        StdlibFunc::Keys,
        StdlibFunc::Push,
    ] {
        globals.insert(func.name().to_string(), native(func));
    }

    let mut math_obj = BTreeMap::new();
    math_obj.insert("floor".to_string(), native(StdlibFunc::MathFloor));
    globals.insert("math".to_string(), Val::obj(math_obj));

    let mut coroutine_obj = BTreeMap::new();
    coroutine_obj.insert("create".to_string(), native(StdlibFunc::CoroutineCreate));
    coroutine_obj.insert("resume".to_string(), native(StdlibFunc::CoroutineResume));
    coroutine_obj.insert("yield".to_string(), native(StdlibFunc::CoroutineYield));
    coroutine_obj.insert("status".to_string(), native(StdlibFunc::CoroutineStatus));
    globals.insert("coroutine".to_string(), Val::obj(coroutine_obj));
}
