//! Execution context
//!
//! Created per top-level invocation chain. Carries the runtime, the call
//! mode (fixed at creation) and the evaluation snapshot host functions read
//! from. Host functions receive it as their first argument.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::executor::CallMode;
use crate::host::Runtime;

/// Immutable view of host state taken at one point in time
#[derive(Clone, Default)]
pub struct Snapshot(Option<Arc<dyn Any + Send + Sync>>);

impl Snapshot {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Snapshot(Some(Arc::new(value)))
    }

    pub fn empty() -> Self {
        Snapshot(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.clone().and_then(|value| value.downcast::<T>().ok())
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "Snapshot(empty)")
        } else {
            write!(f, "Snapshot(..)")
        }
    }
}

/// Produces evaluation snapshots for new and refreshed contexts
pub trait EvaluationSource: Send + Sync {
    fn snapshot(&self) -> Snapshot;
}

struct ContextInner {
    runtime: Runtime,
    mode: CallMode,
    snapshot: Mutex<Snapshot>,
    refresh_requested: AtomicBool,
}

#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl ExecutionContext {
    /// A context with a fresh snapshot from the runtime's evaluation source
    pub fn new(runtime: &Runtime, mode: CallMode) -> Self {
        let snapshot = take_snapshot(runtime);
        Self::with_snapshot(runtime, mode, snapshot)
    }

    pub fn with_snapshot(runtime: &Runtime, mode: CallMode, snapshot: Snapshot) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                runtime: runtime.clone(),
                mode,
                snapshot: Mutex::new(snapshot),
                refresh_requested: AtomicBool::new(false),
            }),
        }
    }

    /// A context for the same runtime and snapshot, in another mode
    pub fn derive(&self, mode: CallMode) -> Self {
        Self::with_snapshot(&self.inner.runtime, mode, self.snapshot())
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn mode(&self) -> CallMode {
        self.inner.mode
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot.lock().clone()
    }

    /// Ask for a new snapshot before the script continues
    pub fn request_refresh(&self) {
        self.inner.refresh_requested.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_refresh_request(&self) -> bool {
        self.inner.refresh_requested.swap(false, Ordering::SeqCst)
    }

    /// Replace the snapshot with a new one from the evaluation source
    pub fn refresh(&self) {
        let snapshot = take_snapshot(&self.inner.runtime);
        *self.inner.snapshot.lock() = snapshot;
        debug!(runtime = self.inner.runtime.id(), "execution context refreshed");
    }
}

fn take_snapshot(runtime: &Runtime) -> Snapshot {
    runtime
        .evaluation_source()
        .map(|source| source.snapshot())
        .unwrap_or_default()
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("runtime", &self.inner.runtime.id())
            .field("mode", &self.inner.mode)
            .field("snapshot", &*self.inner.snapshot.lock())
            .finish()
    }
}
