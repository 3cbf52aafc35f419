//! Script coroutines

use super::helpers::{build_execution, items, run, run_ok};
use crate::executor::{new_globals, HostFnId, NativeFn, Outcome, Val};

#[test]
fn test_resume_and_yield_pass_values() {
    let source = r#"
        let co = coroutine.create(function(a) {
            let b = coroutine.yield(a + 1)
            return b * 2
        })
        let first = coroutine.resume(co, 1)
        let between = coroutine.status(co)
        let second = coroutine.resume(co, 10)
        return [first[0], first[1], between, second[0], second[1], coroutine.status(co)]
    "#;
    assert_eq!(
        items(&run_ok(source)),
        vec![
            Val::Bool(true),
            Val::Num(2.0),
            Val::str("suspended"),
            Val::Bool(true),
            Val::Num(20.0),
            Val::str("dead"),
        ]
    );
}

#[test]
fn test_generator_loop() {
    let source = r#"
        let gen = coroutine.create(function() {
            for (let i of [1, 2, 3]) { coroutine.yield(i * 10) }
        })
        let seen = []
        while (true) {
            let r = coroutine.resume(gen)
            if (coroutine.status(gen) == "dead") { break }
            push(seen, r[1])
        }
        return seen
    "#;
    assert_eq!(
        items(&run_ok(source)),
        vec![Val::Num(10.0), Val::Num(20.0), Val::Num(30.0)]
    );
}

#[test]
fn test_resuming_dead_coroutine_is_stable() {
    let source = r#"
        let co = coroutine.create(function() { return "done" })
        let results = [coroutine.resume(co)]
        for (let i of [1, 2, 3]) { push(results, coroutine.resume(co)) }
        return results
    "#;
    let results = items(&run_ok(source));
    assert_eq!(
        items(&results[0]),
        vec![Val::Bool(true), Val::str("done")]
    );
    for result in &results[1..] {
        assert_eq!(
            items(result),
            vec![Val::Bool(false), Val::str("cannot resume dead coroutine")]
        );
    }
}

#[test]
fn test_error_inside_coroutine_kills_it() {
    let source = r#"
        let co = coroutine.create(function() { throw "inside" })
        let r = coroutine.resume(co)
        return [r[0], r[1], coroutine.status(co)]
    "#;
    assert_eq!(
        items(&run_ok(source)),
        vec![Val::Bool(false), Val::str("inside"), Val::str("dead")]
    );
}

#[test]
fn test_status_running_and_normal() {
    let source = r#"
        outer = coroutine.create(function() {
            let inner = coroutine.create(function() {
                return coroutine.status(outer)
            })
            return [coroutine.status(outer), coroutine.resume(inner)[1]]
        })
        return coroutine.resume(outer)[1]
    "#;
    assert_eq!(
        items(&run_ok(source)),
        vec![Val::str("running"), Val::str("normal")]
    );
}

#[test]
fn test_resuming_running_coroutine() {
    let source = r#"
        co = coroutine.create(function() { return coroutine.resume(co) })
        return coroutine.resume(co)[1]
    "#;
    assert_eq!(
        items(&run_ok(source)),
        vec![
            Val::Bool(false),
            Val::str("cannot resume non-suspended coroutine"),
        ]
    );
}

#[test]
fn test_yield_outside_coroutine() {
    let err = run("coroutine.yield(1)").unwrap_err();
    assert!(err
        .message
        .contains("attempt to yield from outside a coroutine"));
}

#[test]
fn test_host_call_inside_coroutine_parks_whole_chain() {
    let mut globals = new_globals();
    globals.insert("host".to_string(), Val::NativeFunc(NativeFn::Host(HostFnId(0))));

    let source = r#"
        co = coroutine.create(function() {
            let v = host()
            coroutine.yield(v)
            return "end"
        })
        let r = coroutine.resume(co)
        return [r[1], coroutine.status(co)]
    "#;
    let mut execution = build_execution(source);
    let Outcome::HostCall { .. } = execution.run(&mut globals) else {
        panic!("expected a host call");
    };
    execution.park();

    let Some(Val::Coroutine(co)) = globals.get("co").cloned() else {
        panic!("coroutine global missing");
    };
    assert_eq!(co.lock().status(), "running");

    execution.deliver(Ok(Val::str("from host")));
    let Outcome::Returned(v) = execution.run(&mut globals) else {
        panic!("expected a return");
    };
    assert_eq!(items(&v), vec![Val::str("from host"), Val::str("suspended")]);
}
