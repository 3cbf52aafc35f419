//! Loading module sets into an aggregate

use super::helpers::{collecting_runtime, module, returning};
use crate::host::HostValue;
use crate::modules::{call_all, load_all, HookName, HOOKS_PATH};

#[test]
fn test_partial_aggregate_when_one_module_fails_to_compile() {
    let (runtime, display) = collecting_runtime();
    let sources = vec![
        returning("/a.editor_script", "get_commands", "\"a\""),
        module("/b.editor_script", "return { get_commands: function( }"),
        returning("/c.editor_script", "get_commands", "\"c\""),
    ];

    let aggregate = load_all(&runtime, &sources);

    assert!(!aggregate.is_empty());
    assert_eq!(aggregate.modules(), ["/a.editor_script", "/c.editor_script"]);
    assert_eq!(aggregate.hooks(HookName::GetCommands).len(), 2);

    let errors = display.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("/b.editor_script:1:"), "{}", errors[0]);
}

#[test]
fn test_non_object_result_is_excluded() {
    let (runtime, display) = collecting_runtime();
    let sources = vec![
        module("/num.editor_script", "return 5"),
        module("/nothing.editor_script", "let x = 1"),
    ];

    let aggregate = load_all(&runtime, &sources);

    assert!(aggregate.is_empty());
    assert_eq!(
        display.errors(),
        vec![
            "/num.editor_script: module must return an object of hooks, got number".to_string(),
            "/nothing.editor_script: module must return an object of hooks, got null".to_string(),
        ]
    );
}

#[test]
fn test_hook_that_is_not_a_function_excludes_module() {
    let (runtime, display) = collecting_runtime();
    let sources = vec![module(
        "/bad.editor_script",
        "return { get_commands: function() { return [] }, on_build_started: \"soon\" }",
    )];

    let aggregate = load_all(&runtime, &sources);

    assert!(aggregate.is_empty());
    assert!(aggregate.hooks(HookName::GetCommands).is_empty());
    assert_eq!(
        display.errors(),
        vec!["/bad.editor_script: hook 'on_build_started' must be a function, got string".to_string()]
    );
}

#[test]
fn test_throwing_module_is_attributed_to_its_line() {
    let (runtime, display) = collecting_runtime();
    let sources = vec![module("/boom.editor_script", "let a = 1\nthrow \"boom\"")];

    let aggregate = load_all(&runtime, &sources);

    assert!(aggregate.is_empty());
    assert_eq!(display.errors(), vec!["/boom.editor_script:2: boom".to_string()]);
}

#[test]
fn test_unknown_keys_are_ignored() {
    let (runtime, display) = collecting_runtime();
    let sources = vec![module(
        "/m.editor_script",
        "return { helper: 1, on_build_started: function() { return null } }",
    )];

    let aggregate = load_all(&runtime, &sources);

    assert_eq!(aggregate.modules(), ["/m.editor_script"]);
    assert_eq!(aggregate.hooks(HookName::OnBuildStarted).len(), 1);
    assert!(display.errors().is_empty());
}

#[test]
fn test_hooks_module_is_exposed_separately() {
    let (runtime, _display) = collecting_runtime();
    let sources = vec![
        returning("/other.editor_script", "on_build_started", "1"),
        returning(HOOKS_PATH, "on_build_started", "2"),
    ];

    let aggregate = load_all(&runtime, &sources);

    let entry = aggregate.lifecycle_hook(HookName::OnBuildStarted).unwrap();
    assert_eq!(entry.path, HOOKS_PATH);
    assert!(aggregate.lifecycle_hook(HookName::OnBuildFinished).is_none());
    assert_eq!(aggregate.lifecycle_hooks().unwrap().len(), 1);
    assert_eq!(aggregate.hooks(HookName::OnBuildStarted).len(), 2);
}

#[test]
fn test_no_hooks_module() {
    let (runtime, _display) = collecting_runtime();
    let aggregate = load_all(&runtime, &[returning("/a.editor_script", "get_commands", "1")]);
    assert!(aggregate.lifecycle_hooks().is_none());
}

#[test]
fn test_modules_share_runtime_globals() {
    let (runtime, _display) = collecting_runtime();
    let sources = vec![
        module("/a.editor_script", "shared = 41\nreturn {}"),
        module(
            "/b.editor_script",
            "return { get_commands: function() { return shared + 1 } }",
        ),
    ];

    let aggregate = load_all(&runtime, &sources);
    let results: Vec<_> = call_all(&aggregate, HookName::GetCommands, vec![], None).collect();

    assert_eq!(
        results,
        vec![("/b.editor_script".to_string(), HostValue::Int(42))]
    );
}

#[test]
fn test_load_order_is_source_order() {
    let (runtime, _display) = collecting_runtime();
    let sources: Vec<_> = (0..50)
        .map(|i| returning(&format!("/m{:02}.editor_script", i), "get_commands", &i.to_string()))
        .collect();

    let aggregate = load_all(&runtime, &sources);
    let values: Vec<_> = call_all(&aggregate, HookName::GetCommands, vec![], None)
        .map(|(_, value)| value)
        .collect();

    assert_eq!(values, (0..50).map(HostValue::Int).collect::<Vec<_>>());
}

#[test]
fn test_print_during_load_goes_to_display() {
    let (runtime, display) = collecting_runtime();
    load_all(
        &runtime,
        &[module("/p.editor_script", "print(\"loading\", 1)\nreturn {}")],
    );
    assert_eq!(display.out(), vec!["loading 1".to_string()]);
}

#[test]
fn test_hook_name_round_trip() {
    for hook in HookName::ALL {
        assert_eq!(hook.as_str().parse::<HookName>(), Ok(hook));
    }
    assert!("get_everything".parse::<HookName>().is_err());
    assert!(HookName::OnTargetLaunched.is_lifecycle());
    assert!(!HookName::GetPrefsSchema.is_lifecycle());
}
