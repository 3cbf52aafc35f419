//! Functions, captures and recursion

use super::helpers::{compile_err, items, run, run_ok};
use crate::executor::Val;

#[test]
fn test_captures_are_copied_at_creation() {
    let source = r#"
        let x = 1
        let f = function() { return x }
        x = 2
        return [f(), x]
    "#;
    assert_eq!(items(&run_ok(source)), vec![Val::Num(1.0), Val::Num(2.0)]);
}

#[test]
fn test_shared_state_through_objects() {
    let source = r#"
        function counter() {
            let state = {n: 0}
            return function() {
                state.n = state.n + 1
                return state.n
            }
        }
        let next = counter()
        next()
        next()
        return next()
    "#;
    assert_eq!(run_ok(source), Val::Num(3.0));
}

#[test]
fn test_assign_to_captured_variable_is_a_compile_error() {
    let err = compile_err(
        r#"
        let x = 1
        let f = function() {
            x = 2
        }
    "#,
    );
    assert_eq!(err.line, Some(4));
    assert!(err.message.contains("cannot assign to captured variable 'x'"));
}

#[test]
fn test_assign_to_const_is_a_compile_error() {
    let err = compile_err("const x = 1\nx = 2");
    assert_eq!(err.line, Some(2));
    assert!(err.message.contains("cannot assign to const variable 'x'"));
}

#[test]
fn test_redeclaration_in_same_scope() {
    let err = compile_err("let a = 1\nlet a = 2");
    assert!(err.message.contains("'a' is already declared in this scope"));

    // Shadowing in a nested block is fine
    assert_eq!(
        run_ok("let a = 1\n{ let a = 2 }\nreturn a"),
        Val::Num(1.0)
    );
}

#[test]
fn test_recursive_fib() {
    let source = r#"
        function fib(n) {
            if (n < 2) { return n }
            return fib(n - 1) + fib(n - 2)
        }
        return fib(20)
    "#;
    assert_eq!(run_ok(source), Val::Num(6765.0));
}

#[test]
fn test_named_function_expression_refers_to_itself() {
    let source = r#"
        let fact = function f(n) { return n <= 1 ? 1 : n * f(n - 1) }
        return fact(5)
    "#;
    assert_eq!(run_ok(source), Val::Num(120.0));
}

#[test]
fn test_missing_arguments_are_null_and_extra_are_dropped() {
    let source = r#"
        function pair(a, b) { return [a, b] }
        let short = pair(1)
        let long = pair(1, 2, 3)
        return [short[1], len(long)]
    "#;
    assert_eq!(items(&run_ok(source)), vec![Val::Null, Val::Num(2.0)]);
}

#[test]
fn test_nested_captures() {
    let source = r#"
        function outer(a) {
            return function(b) {
                return function(c) { return a + b + c }
            }
        }
        return outer(1)(2)(3)
    "#;
    assert_eq!(run_ok(source), Val::Num(6.0));
}

#[test]
fn test_stack_overflow() {
    let err = run("function f() { return f() }\nreturn f()").unwrap_err();
    assert!(err.message.contains("stack overflow"), "{}", err);
}

#[test]
fn test_calling_a_non_function() {
    let err = run("let x = 3\nx()").unwrap_err();
    assert!(err.message.contains("attempt to call a number value"));
    assert_eq!(err.line, 2);
}
