//! Lifecycle hooks and the actions they return

use std::sync::Arc;

use tokio_test::{assert_err, assert_ok};

use super::helpers::{collecting_runtime, module};
use crate::actions::{Collaborators, InMemoryStore, Target, TokioProcessRunner};
use crate::error::{ActionError, HookError};
use crate::host::HostValue;
use crate::modules::{load_all, run_lifecycle_hook, HookName, HOOKS_PATH};

fn collaborators(store: &Arc<InMemoryStore>) -> Collaborators {
    Collaborators::new(
        store.clone(),
        Arc::new(TokioProcessRunner::new()),
        tokio::runtime::Handle::current(),
    )
}

fn build_target() -> Target {
    Target::Resource("/build".to_string())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_returned_actions_are_performed() {
    let (runtime, display) = collecting_runtime();
    let hooks = module(
        HOOKS_PATH,
        r#"
        return {
            on_build_started: function(target) {
                return [
                    { kind: "set", target: "/build", property: "status", value: "building" },
                    { kind: "set", target: "/build", property: "target", value: target },
                ]
            }
        }
        "#,
    );
    let aggregate = load_all(&runtime, &[hooks]);
    let store = Arc::new(InMemoryStore::new());

    let result = run_lifecycle_hook(
        &aggregate,
        HookName::OnBuildStarted,
        vec![HostValue::from("linux")],
        &collaborators(&store),
    )
    .await;

    assert_ok!(result);
    assert_eq!(store.get(&build_target(), "status"), Some(HostValue::from("building")));
    assert_eq!(store.get(&build_target(), "target"), Some(HostValue::from("linux")));
    assert_eq!(store.version(), 1);
    assert!(display.errors().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_hook_completes_immediately() {
    let (runtime, _display) = collecting_runtime();
    let aggregate = load_all(&runtime, &[module(HOOKS_PATH, "return {}")]);
    let store = Arc::new(InMemoryStore::new());

    let deferred = run_lifecycle_hook(
        &aggregate,
        HookName::OnTargetTerminated,
        vec![],
        &collaborators(&store),
    );
    assert!(deferred.is_done());
    assert_ok!(deferred.await);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_only_hooks_module_is_run() {
    let (runtime, _display) = collecting_runtime();
    let other = module(
        "/other.editor_script",
        r#"return { on_bundle_started: function() { return [{ kind: "set", target: "/x", property: "p", value: 1 }] } }"#,
    );
    let aggregate = load_all(&runtime, &[other]);
    let store = Arc::new(InMemoryStore::new());

    assert_ok!(
        run_lifecycle_hook(&aggregate, HookName::OnBundleStarted, vec![], &collaborators(&store)).await
    );
    assert_eq!(store.version(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_throwing_hook_is_reported_and_fails() {
    let (runtime, display) = collecting_runtime();
    let hooks = module(
        HOOKS_PATH,
        "return {\n  on_build_finished: function() {\n    throw \"build broke\"\n  }\n}",
    );
    let aggregate = load_all(&runtime, &[hooks]);
    let store = Arc::new(InMemoryStore::new());

    let err = assert_err!(
        run_lifecycle_hook(&aggregate, HookName::OnBuildFinished, vec![], &collaborators(&store)).await
    );

    assert!(matches!(err, HookError::Script { ref path, .. } if path == HOOKS_PATH));
    assert_eq!(
        display.errors(),
        vec![format!("{}:3: build broke", HOOKS_PATH)]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_non_list_result_is_rejected() {
    let (runtime, display) = collecting_runtime();
    let hooks = module(
        HOOKS_PATH,
        "return { on_target_launched: function() { return \"done\" } }",
    );
    let aggregate = load_all(&runtime, &[hooks]);
    let store = Arc::new(InMemoryStore::new());

    let err = assert_err!(
        run_lifecycle_hook(&aggregate, HookName::OnTargetLaunched, vec![], &collaborators(&store)).await
    );

    assert_eq!(
        err,
        HookError::InvalidResult {
            path: HOOKS_PATH.to_string(),
            hook: "on_target_launched".to_string(),
            found: "string",
        }
    );
    assert_eq!(display.errors().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_actions_are_reported_and_fail() {
    let (runtime, display) = collecting_runtime();
    let hooks = module(
        HOOKS_PATH,
        r#"return { on_bundle_finished: function() { return [{ kind: "set", target: "/x", property: "locked", value: 1 }] } }"#,
    );
    let aggregate = load_all(&runtime, &[hooks]);
    let store = Arc::new(InMemoryStore::new());
    store.make_read_only("locked");

    let err = assert_err!(
        run_lifecycle_hook(&aggregate, HookName::OnBundleFinished, vec![], &collaborators(&store)).await
    );

    let HookError::Action { source, .. } = err else {
        panic!("expected an action failure, got {:?}", err);
    };
    assert!(matches!(source, ActionError::Transaction(_)));
    let errors = display.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with(HOOKS_PATH), "{}", errors[0]);
}
