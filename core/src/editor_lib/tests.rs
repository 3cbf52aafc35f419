use std::sync::Arc;

use parking_lot::Mutex;

use super::editor_functions;
use crate::actions::{Collaborators, ExitFuture, InMemoryStore, Mutation, ProcessRunner, PropertyStore, Target};
use crate::error::ScriptError;
use crate::executor::compile;
use crate::host::{BoundFunction, HostValue, Runtime};

#[derive(Default)]
struct RecordingRunner {
    commands: Mutex<Vec<Vec<String>>>,
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, command: Vec<String>) -> ExitFuture {
        let code = if command[0] == "false" { 1 } else { 0 };
        self.commands.lock().push(command);
        Box::pin(async move { Ok(code) })
    }
}

struct Editor {
    runtime: Runtime,
    store: Arc<InMemoryStore>,
    runner: Arc<RecordingRunner>,
}

fn editor() -> Editor {
    let store = Arc::new(InMemoryStore::new());
    let runner = Arc::new(RecordingRunner::default());
    let collaborators = Collaborators::new(
        store.clone(),
        runner.clone(),
        tokio::runtime::Handle::current(),
    );
    let runtime = Runtime::builder()
        .evaluation_source(store.clone())
        .functions(editor_functions(&collaborators))
        .build()
        .unwrap();
    Editor {
        runtime,
        store,
        runner,
    }
}

fn bind(runtime: &Runtime, source: &str) -> BoundFunction {
    let prototype = compile("/test.editor_script", source).unwrap();
    runtime.bind(&prototype).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_reads_snapshot() {
    let editor = editor();
    editor
        .store
        .transact(vec![Mutation {
            target: Target::Resource("/main.scene".to_string()),
            property: "title".to_string(),
            value: HostValue::from("Main"),
        }])
        .unwrap();

    let f = bind(
        &editor.runtime,
        "return [editor.get(\"/main.scene\", \"title\"), editor.get(\"/main.scene\", \"missing\")]",
    );
    let result = editor.runtime.invoke_immediate(&f, vec![], None).unwrap();
    assert_eq!(
        result,
        HostValue::List(vec![HostValue::from("Main"), HostValue::Null])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_transact_refreshes_snapshot() {
    let editor = editor();
    let f = bind(
        &editor.runtime,
        r#"
        let before = editor.get("/a", "n")
        editor.transact([{ kind: "set", target: "/a", property: "n", value: 3 }])
        let after = editor.get("/a", "n")
        return [before, after]
        "#,
    );

    let result = editor.runtime.invoke_suspending(&f, vec![]).await.unwrap();
    assert_eq!(
        result,
        HostValue::List(vec![HostValue::Null, HostValue::Int(3)])
    );
    assert_eq!(editor.store.version(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_transact_in_immediate_call_is_refused() {
    let editor = editor();
    let f = bind(
        &editor.runtime,
        r#"editor.transact([{ kind: "set", target: "/a", property: "n", value: 3 }])"#,
    );

    let err = editor.runtime.invoke_immediate(&f, vec![], None).unwrap_err();
    assert_eq!(
        err,
        ScriptError::SuspensionPolicy {
            function: "editor.transact".to_string()
        }
    );
    assert_eq!(editor.store.version(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_transact_rejects_other_kinds() {
    let editor = editor();
    let f = bind(
        &editor.runtime,
        r#"
        try {
            editor.transact([{ kind: "shell", command: ["rm", "-rf", "/"] }])
        } catch (e) {
            return e
        }
        "#,
    );

    let result = editor.runtime.invoke_suspending(&f, vec![]).await.unwrap();
    assert_eq!(
        result,
        HostValue::from("editor.transact: only 'set' actions can be applied, got 'shell'")
    );
    assert!(editor.runner.commands.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_execute_returns_exit_code() {
    let editor = editor();
    let f = bind(
        &editor.runtime,
        "return [editor.execute([\"make\", \"all\"]), editor.execute([\"false\"])]",
    );

    let result = editor.runtime.invoke_suspending(&f, vec![]).await.unwrap();
    assert_eq!(
        result,
        HostValue::List(vec![HostValue::Int(0), HostValue::Int(1)])
    );
    assert_eq!(editor.runner.commands.lock().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_argument_errors_reach_script() {
    let editor = editor();
    let f = bind(
        &editor.runtime,
        "let r = pcall(editor.get, 5, \"x\")\nreturn r[1]",
    );

    let result = editor.runtime.invoke_immediate(&f, vec![], None).unwrap();
    assert_eq!(
        result,
        HostValue::from("editor.get: target must be a node handle or a resource path, got number")
    );
}
