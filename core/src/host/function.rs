//! Host functions and bound script functions

use std::fmt;
use std::sync::Arc;

use super::value::HostValue;
use crate::context::ExecutionContext;
use crate::deferred::Deferred;
use crate::error::HostError;
use crate::executor::Val;

/// How a host function delivers its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Runs to completion before returning
    Plain,
    /// Returns a deferred result; only suspending calls may wait on it
    Suspendable,
}

pub type PlainFn =
    dyn Fn(&ExecutionContext, Vec<HostValue>) -> Result<HostValue, HostError> + Send + Sync;

pub type SuspendableFn =
    dyn Fn(&ExecutionContext, Vec<HostValue>) -> Deferred<HostValue, HostError> + Send + Sync;

/// A callable registered into a runtime's globals
#[derive(Clone)]
pub enum HostFunction {
    Plain(Arc<PlainFn>),
    Suspendable(Arc<SuspendableFn>),
}

impl HostFunction {
    pub fn plain<F>(f: F) -> Self
    where
        F: Fn(&ExecutionContext, Vec<HostValue>) -> Result<HostValue, HostError>
            + Send
            + Sync
            + 'static,
    {
        HostFunction::Plain(Arc::new(f))
    }

    pub fn suspendable<F>(f: F) -> Self
    where
        F: Fn(&ExecutionContext, Vec<HostValue>) -> Deferred<HostValue, HostError>
            + Send
            + Sync
            + 'static,
    {
        HostFunction::Suspendable(Arc::new(f))
    }

    pub fn capability(&self) -> Capability {
        match self {
            HostFunction::Plain(_) => Capability::Plain,
            HostFunction::Suspendable(_) => Capability::Suspendable,
        }
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({:?})", self.capability())
    }
}

/// A script function tied to the runtime that created it
#[derive(Clone)]
pub struct BoundFunction {
    pub(crate) runtime_id: u64,
    pub(crate) callee: Val,
}

impl BoundFunction {
    pub(crate) fn new(runtime_id: u64, callee: Val) -> Self {
        Self { runtime_id, callee }
    }

    pub fn runtime_id(&self) -> u64 {
        self.runtime_id
    }
}

impl PartialEq for BoundFunction {
    fn eq(&self, other: &Self) -> bool {
        self.runtime_id == other.runtime_id && self.callee == other.callee
    }
}

impl fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (runtime #{})", self.callee, self.runtime_id)
    }
}
