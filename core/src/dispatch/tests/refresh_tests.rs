//! Snapshot refresh after host calls

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::helpers::bind;
use crate::context::{EvaluationSource, ExecutionContext, Snapshot};
use crate::deferred::{self, Deferred};
use crate::error::HostError;
use crate::host::{HostFunction, HostValue, Runtime};

/// Evaluation source whose snapshot is a version number
#[derive(Default)]
struct Versioned {
    version: AtomicU64,
    snapshots: AtomicUsize,
}

impl EvaluationSource for Versioned {
    fn snapshot(&self) -> Snapshot {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Snapshot::new(self.version.load(Ordering::SeqCst))
    }
}

fn read_version(ctx: &ExecutionContext) -> Result<HostValue, HostError> {
    ctx.snapshot()
        .downcast::<u64>()
        .map(|v| HostValue::Int(*v as i64))
        .ok_or_else(|| HostError::new("no snapshot"))
}

/// `version()` reads the snapshot, `bump(refresh)` changes the source later
fn versioned_runtime(source: Arc<Versioned>) -> Runtime {
    let bump_source = source.clone();
    let sync_source = source.clone();
    Runtime::builder()
        .evaluation_source(source)
        .function("version", HostFunction::plain(|ctx, _args| read_version(ctx)))
        .function(
            "bump",
            HostFunction::suspendable(move |ctx, args| {
                let refresh = args.first().map(|v| v == &HostValue::Bool(true)).unwrap_or(false);
                let source = bump_source.clone();
                let ctx = ctx.clone();
                let (resolver, deferred) = deferred::pending();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10));
                    source.version.fetch_add(1, Ordering::SeqCst);
                    if refresh {
                        ctx.request_refresh();
                    }
                    resolver.complete(HostValue::Null);
                });
                deferred
            }),
        )
        .function(
            "bump_now",
            HostFunction::suspendable(move |ctx, _args| {
                sync_source.version.fetch_add(1, Ordering::SeqCst);
                ctx.request_refresh();
                Deferred::completed(HostValue::Null)
            }),
        )
        .build()
        .unwrap()
}

#[test]
fn test_refresh_after_async_host_call() {
    let source = Arc::new(Versioned::default());
    let runtime = versioned_runtime(source.clone());
    let f = bind(
        &runtime,
        "let before = version()\nbump(true)\nlet after = version()\nreturn [before, after]",
    );

    let result = runtime.invoke_suspending(&f, vec![]).wait().unwrap();
    assert_eq!(
        result,
        HostValue::List(vec![HostValue::Int(0), HostValue::Int(1)])
    );
    // One snapshot for the new context, one for the refresh
    assert_eq!(source.snapshots.load(Ordering::SeqCst), 2);
}

#[test]
fn test_refresh_after_settled_host_call() {
    let source = Arc::new(Versioned::default());
    let runtime = versioned_runtime(source.clone());
    let f = bind(
        &runtime,
        "let before = version()\nbump_now()\nlet after = version()\nreturn [before, after]",
    );

    let deferred = runtime.invoke_suspending(&f, vec![]);
    assert!(deferred.is_done());
    assert_eq!(
        deferred.wait().unwrap(),
        HostValue::List(vec![HostValue::Int(0), HostValue::Int(1)])
    );
    assert_eq!(source.snapshots.load(Ordering::SeqCst), 2);
}

#[test]
fn test_snapshot_is_stable_without_refresh() {
    let source = Arc::new(Versioned::default());
    let runtime = versioned_runtime(source.clone());
    let f = bind(
        &runtime,
        "let before = version()\nbump(false)\nbump(false)\nlet after = version()\nreturn [before, after]",
    );

    let result = runtime.invoke_suspending(&f, vec![]).wait().unwrap();
    assert_eq!(
        result,
        HostValue::List(vec![HostValue::Int(0), HostValue::Int(0)])
    );
    assert_eq!(source.version.load(Ordering::SeqCst), 2);
    assert_eq!(source.snapshots.load(Ordering::SeqCst), 1);
}

#[test]
fn test_refresh_request_is_consumed_once() {
    let source = Arc::new(Versioned::default());
    let runtime = versioned_runtime(source.clone());
    let f = bind(
        &runtime,
        "bump(true)\nversion()\nversion()\nbump(false)\nreturn version()",
    );

    let result = runtime.invoke_suspending(&f, vec![]).wait().unwrap();
    assert_eq!(result, HostValue::Int(1));
    assert_eq!(source.snapshots.load(Ordering::SeqCst), 2);
}

#[test]
fn test_immediate_call_shares_caller_snapshot() {
    let source = Arc::new(Versioned::default());
    let runtime = versioned_runtime(source.clone());
    let ctx = ExecutionContext::new(&runtime, crate::executor::CallMode::Immediate);
    source.version.store(9, Ordering::SeqCst);

    let f = bind(&runtime, "return version()");
    let result = runtime.invoke_immediate(&f, vec![], Some(&ctx)).unwrap();
    assert_eq!(result, HostValue::Int(0));
}
