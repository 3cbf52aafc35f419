//! One call in flight per runtime

use std::collections::HashSet;
use std::thread;

use super::helpers::{bind, eval};
use crate::deferred;
use crate::host::{HostFunction, HostValue, Runtime};

const THREADS: usize = 10;
const CALLS: usize = 1000;

const SUSPENDING_CALLS: usize = 40;
const RESUMPTIONS: usize = 50;
const IMMEDIATE_THREADS: usize = 8;
const IMMEDIATE_CALLS: usize = 500;

#[test]
fn test_concurrent_increments_are_never_lost() {
    for _ in 0..100 {
        let runtime = Runtime::builder().build().unwrap();
        eval(&runtime, "counter = 1");
        let increment = bind(&runtime, "counter = counter + 1\nreturn counter");

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let runtime = runtime.clone();
                let increment = increment.clone();
                thread::spawn(move || {
                    (0..CALLS)
                        .map(|_| runtime.invoke_immediate(&increment, vec![], None).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            for value in worker.join().unwrap() {
                let HostValue::Int(n) = value else {
                    panic!("expected an integer, got {:?}", value);
                };
                assert!(seen.insert(n), "value {} observed twice", n);
            }
        }

        assert_eq!(seen.len(), THREADS * CALLS);
        assert_eq!(
            runtime.global("counter").unwrap(),
            HostValue::Int((THREADS * CALLS + 1) as i64)
        );
    }
}

#[test]
fn test_nested_immediate_call_from_host_function() {
    let runtime = Runtime::builder()
        .function(
            "call_back",
            crate::host::HostFunction::plain(|ctx, args| {
                let Some(f) = args.first().and_then(HostValue::as_function) else {
                    return Err(crate::error::HostError::new("function expected"));
                };
                ctx.runtime()
                    .invoke_immediate(f, vec![HostValue::Int(2)], Some(ctx))
                    .map_err(|e| crate::error::HostError::new(e.to_string()))
            }),
        )
        .build()
        .unwrap();

    let result = eval(&runtime, "return call_back(function(x) { return x * 21 })");
    assert_eq!(result, HostValue::Int(42));
}

#[test]
fn test_resumed_calls_and_immediate_calls_share_one_lock() {
    let runtime = Runtime::builder()
        .function(
            "tick",
            HostFunction::suspendable(|_ctx, _args| {
                let (resolver, deferred) = deferred::pending();
                thread::spawn(move || resolver.resolve(Ok(HostValue::Null)));
                deferred
            }),
        )
        .build()
        .unwrap();
    eval(&runtime, "counter = 0");

    // Each resumption reads and writes `counter` with no suspension between
    let looping = bind(
        &runtime,
        &format!(
            "let i = 0\nwhile (i < {}) {{\n  tick()\n  let c = counter\n  counter = c + 1\n  i = i + 1\n}}",
            RESUMPTIONS
        ),
    );
    let increment = bind(&runtime, "let c = counter\ncounter = c + 1");

    let calls: Vec<_> = (0..SUSPENDING_CALLS)
        .map(|_| runtime.invoke_suspending(&looping, vec![]))
        .collect();

    let workers: Vec<_> = (0..IMMEDIATE_THREADS)
        .map(|_| {
            let runtime = runtime.clone();
            let increment = increment.clone();
            thread::spawn(move || {
                for _ in 0..IMMEDIATE_CALLS {
                    runtime.invoke_immediate(&increment, vec![], None).unwrap();
                }
            })
        })
        .collect();

    for call in calls {
        assert_eq!(call.wait(), Ok(HostValue::Null));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(
        runtime.global("counter").unwrap(),
        HostValue::Int((SUSPENDING_CALLS * RESUMPTIONS + IMMEDIATE_THREADS * IMMEDIATE_CALLS) as i64)
    );
}
