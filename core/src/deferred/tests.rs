use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{pending, Deferred};
use crate::error::HostError;

#[test]
fn test_completed_is_done_before_anyone_waits() {
    let deferred: Deferred<i32, HostError> = Deferred::completed(3);
    assert!(deferred.is_done());
    assert_eq!(deferred.try_take(), Some(Ok(3)));
    assert_eq!(deferred.try_take(), None);
}

#[test]
fn test_try_take_on_pending() {
    let (resolver, deferred) = pending::<i32, HostError>();
    assert!(!deferred.is_done());
    assert_eq!(deferred.try_take(), None);
    resolver.complete(5);
    assert!(deferred.is_done());
    assert_eq!(deferred.try_take(), Some(Ok(5)));
}

#[test]
fn test_wait_for_other_thread() {
    let (resolver, deferred) = pending::<String, HostError>();
    let worker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        resolver.complete("done".to_string());
    });
    assert_eq!(deferred.wait(), Ok("done".to_string()));
    worker.join().unwrap();
}

#[test]
fn test_dropped_resolver_abandons() {
    let (resolver, deferred) = pending::<i32, HostError>();
    drop(resolver);
    let err = deferred.wait().unwrap_err();
    assert!(err.message().contains("abandoned"));
}

#[test]
fn test_wait_timeout_while_pending() {
    let (resolver, deferred) = pending::<i32, HostError>();
    assert_eq!(deferred.wait_timeout(Duration::from_millis(10)), None);
    resolver.fail(HostError::new("late"));
    assert_eq!(
        deferred.wait_timeout(Duration::from_millis(10)),
        Some(Err(HostError::new("late")))
    );
}

#[test]
fn test_on_complete_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));

    // Registered before resolution
    let (resolver, deferred) = pending::<i32, HostError>();
    let counter = calls.clone();
    deferred.on_complete(move |result| {
        assert_eq!(result, Ok(1));
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    resolver.complete(1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Registered after resolution runs right away
    let counter = calls.clone();
    Deferred::<i32, HostError>::failed(HostError::new("x")).on_complete(move |result| {
        assert!(result.is_err());
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_map_and_map_err() {
    let (resolver, deferred) = pending::<i32, HostError>();
    let mapped = deferred.map(|n| n * 2);
    resolver.complete(21);
    assert_eq!(mapped.wait(), Ok(42));

    let failed = Deferred::<i32, HostError>::failed(HostError::new("bad"))
        .map_err(|e| HostError::new(format!("wrapped: {}", e)));
    assert_eq!(failed.wait(), Err(HostError::new("wrapped: bad")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_await_resolution_from_thread() {
    let (resolver, deferred) = pending::<i32, HostError>();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        resolver.complete(7);
    });
    assert_eq!(deferred.await, Ok(7));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_spawn_on() {
    let handle = tokio::runtime::Handle::current();
    let deferred: Deferred<i32, HostError> = Deferred::spawn_on(&handle, async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(9)
    });
    assert_eq!(deferred.await, Ok(9));
}
