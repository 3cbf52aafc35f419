//! Interpreter host
//!
//! A `Runtime` owns one interpreter: its globals, its host function table
//! and its output sinks. Values cross between host and script through
//! `HostValue` and the runtime's conversion functions.

mod convert;
pub mod display;
mod function;
mod runtime;
mod value;

#[cfg(test)]
mod tests;

pub use convert::MAX_DEPTH;
pub use display::{attribute, report_error, Attribution, CollectingDisplay, DisplayOutput, OutputKind, StdDisplay, TracingDisplay};
pub use function::{BoundFunction, Capability, HostFunction, PlainFn, SuspendableFn};
pub(crate) use runtime::Interp;
pub use runtime::{Runtime, RuntimeBuilder};
pub use value::{Handle, HostValue, MAX_SAFE_INTEGER};
