//! Script compiler and virtual machine
//!
//! `compile` turns source into a `Prototype`; an `Execution` runs one call
//! of a bound function against a set of globals and stops whenever the
//! script needs a host function.

pub mod compiler;
pub mod errors;
pub mod op_code;
pub mod proto;
pub mod stdlib;
pub mod types;
pub mod vm;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

pub use compiler::compile;
pub use errors::{CompileError, RuntimeError};
pub use proto::Prototype;
pub use types::{CallMode, Closure, HostFnId, NativeFn, Phase, Val};
pub use vm::{Coroutine, Execution, Outcome};

/// Global variables of one runtime
pub type Globals = HashMap<String, Val>;

/// Globals with the standard library installed
pub fn new_globals() -> Globals {
    let mut globals = Globals::new();
    stdlib::inject_stdlib(&mut globals);
    globals
}

/// The function that runs a prototype's top-level body
pub fn main_closure(prototype: &Prototype) -> Val {
    Val::Func(std::sync::Arc::new(Closure {
        proto: prototype.main().clone(),
        captures: Vec::new(),
    }))
}
