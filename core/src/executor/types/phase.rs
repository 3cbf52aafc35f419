//! Execution phases
//!
//! A fiber chain (a top-level call plus the coroutines it is resuming) and
//! every script coroutine each carry one of these. Coroutine suspension and
//! host-future suspension are separate states and are resumed by different
//! parties: scripts resume coroutines, the dispatcher resumes host futures.

use serde::{Deserialize, Serialize};

/// Call mode fixed for the lifetime of an execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallMode {
    /// Must run to completion on the calling thread; suspending is an error
    Immediate,
    /// May park on a suspendable host function
    Suspending,
}

impl std::fmt::Display for CallMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallMode::Immediate => write!(f, "immediate"),
            CallMode::Suspending => write!(f, "suspending"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Phase {
    /// Created, not started yet
    Idle,
    Running(CallMode),
    /// A script coroutine parked by `coroutine.yield`
    SuspendedOnCoroutine,
    /// The whole fiber chain parked on a pending host deferred
    SuspendedOnHostFuture,
    Completed,
    Failed,
}

impl Phase {
    pub fn is_finished(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}
