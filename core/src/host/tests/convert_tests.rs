use std::sync::Arc;

use maplit::btreemap;

use super::helpers::{bind, eval};
use crate::error::ConversionError;
use crate::executor::Val;
use crate::host::{Handle, HostValue, Runtime, MAX_SAFE_INTEGER};

#[test]
fn test_primitive_round_trip() {
    let runtime = Runtime::builder().build().unwrap();
    let values = vec![
        HostValue::Null,
        HostValue::Bool(true),
        HostValue::Bool(false),
        HostValue::Int(0),
        HostValue::Int(-42),
        HostValue::Int(MAX_SAFE_INTEGER),
        HostValue::Int(-MAX_SAFE_INTEGER),
        HostValue::Num(1.5),
        HostValue::Num(-0.25),
        HostValue::Num(1e300),
        HostValue::Str(String::new()),
        HostValue::Str("héllo wörld".to_string()),
        HostValue::Handle(Handle(i64::MAX)),
        HostValue::List(vec![HostValue::Int(1), HostValue::from("two")]),
        HostValue::Map(btreemap! {
            "a".to_string() => HostValue::Int(1),
            "nested".to_string() => HostValue::Map(btreemap! {
                "b".to_string() => HostValue::Bool(true),
            }),
        }),
    ];

    for value in values {
        let script = runtime.to_script_value(&value).unwrap();
        let back = runtime.to_host_value(&script).unwrap();
        assert_eq!(back, value, "round trip of {:?}", value);
    }
}

#[test]
fn test_numbers_compare_across_int_and_num() {
    assert_eq!(HostValue::Int(3), HostValue::Num(3.0));
    assert_ne!(HostValue::Int(3), HostValue::Num(3.5));

    let runtime = Runtime::builder().build().unwrap();
    assert!(matches!(
        runtime.to_host_value(&Val::Num(3.0)),
        Ok(HostValue::Int(3))
    ));
    assert!(matches!(
        runtime.to_host_value(&Val::Num(0.5)),
        Ok(HostValue::Num(n)) if n == 0.5
    ));
}

#[test]
fn test_unsafe_integers_must_be_handles() {
    let runtime = Runtime::builder().build().unwrap();
    let big = MAX_SAFE_INTEGER + 1;

    let err = runtime.to_script_value(&HostValue::Int(big)).unwrap_err();
    assert_eq!(err, ConversionError::UnsafeInteger(big));
    assert!(err.to_string().contains("handle"));

    let err = runtime.to_script_value(&HostValue::Int(i64::MIN)).unwrap_err();
    assert_eq!(err, ConversionError::UnsafeInteger(i64::MIN));

    let handle = runtime.to_script_value(&HostValue::Handle(Handle(big))).unwrap();
    assert_eq!(handle, Val::Handle(big));
}

#[test]
fn test_functions_convert_and_stay_with_their_runtime() {
    let runtime = Runtime::builder().build().unwrap();
    let other = Runtime::builder().build().unwrap();

    let value = eval(&runtime, "return function(a) { return a + 1 }");
    let HostValue::Function(f) = &value else {
        panic!("expected a function, got {:?}", value);
    };
    assert_eq!(f.runtime_id(), runtime.id());
    assert!(runtime.to_script_value(&value).is_ok());
    assert_eq!(
        other.to_script_value(&value).unwrap_err(),
        ConversionError::ForeignFunction
    );

    let result = runtime
        .invoke_immediate(f, vec![HostValue::Int(41)], None)
        .unwrap();
    assert_eq!(result, HostValue::Int(42));
}

#[test]
fn test_coroutines_do_not_cross() {
    let runtime = Runtime::builder().build().unwrap();
    let f = bind(&runtime, "return coroutine.create(function() { })");
    let err = runtime.invoke_immediate(&f, vec![], None).unwrap_err();
    assert!(err.to_string().contains("coroutine values cannot be passed to the host"));
}

#[test]
fn test_cyclic_values_are_rejected() {
    let runtime = Runtime::builder().build().unwrap();
    let list = Val::list(vec![]);
    let Val::List(items) = &list else { unreachable!() };
    items.lock().push(list.clone());

    let err = runtime.to_host_value(&list).unwrap_err();
    assert!(matches!(err, ConversionError::TooDeep(_)));

    // Break the cycle so the list can be freed
    items.lock().clear();
    assert_eq!(Arc::strong_count(items), 1);
}

#[test]
fn test_json_conversion() {
    let json = serde_json::json!({"a": [1, 2.5, "x", null], "b": true});
    let value = HostValue::from_json(&json);
    assert_eq!(
        value,
        HostValue::Map(btreemap! {
            "a".to_string() => HostValue::List(vec![
                HostValue::Int(1),
                HostValue::Num(2.5),
                HostValue::from("x"),
                HostValue::Null,
            ]),
            "b".to_string() => HostValue::Bool(true),
        })
    );
    assert_eq!(value.to_json(), json);
    assert_eq!(
        HostValue::Handle(Handle(7)).to_json(),
        serde_json::json!({"handle": 7})
    );
}
