//! Compiled function prototypes

use std::sync::Arc;

use super::op_code::Op;

/// Where a closure's captured value comes from, relative to the frame
/// that creates the closure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFrom {
    Local(u16),
    Capture(u16),
    CurrentClosure,
}

/// One compiled function
#[derive(Debug)]
pub struct Proto {
    pub name: Arc<str>,
    /// Path of the chunk this function was compiled from
    pub chunk: Arc<str>,
    pub arity: u16,
    /// Local slots, parameters included
    pub locals: u16,
    pub code: Vec<Op>,
    /// Source line per instruction (parallel to code)
    pub lines: Vec<u32>,
    pub protos: Vec<Arc<Proto>>,
    pub captures: Vec<CaptureFrom>,
}

impl Proto {
    pub fn line_at(&self, pc: usize) -> u32 {
        self.lines.get(pc).copied().unwrap_or(0)
    }
}

/// An immutable compiled-but-unbound script unit
///
/// Produced by `compile` and consumed by `Runtime::bind`. Cheap to clone and
/// shareable between threads and runtimes.
#[derive(Debug, Clone)]
pub struct Prototype {
    path: Arc<str>,
    main: Arc<Proto>,
}

impl Prototype {
    pub(crate) fn new(path: Arc<str>, main: Arc<Proto>) -> Self {
        Self { path, main }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn main(&self) -> &Arc<Proto> {
        &self.main
    }
}
