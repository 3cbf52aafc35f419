//! Test helpers for action tests

use std::collections::HashMap;
use std::sync::Arc;

use maplit::btreemap;
use parking_lot::Mutex;

use crate::actions::{Collaborators, ExitFuture, InMemoryStore, ProcessRunner};
use crate::host::HostValue;

pub fn set(target: impl Into<HostValue>, property: &str, value: impl Into<HostValue>) -> HostValue {
    HostValue::Map(btreemap! {
        "kind".to_string() => HostValue::from("set"),
        "target".to_string() => target.into(),
        "property".to_string() => HostValue::from(property),
        "value".to_string() => value.into(),
    })
}

pub fn shell(command: &[&str]) -> HostValue {
    HostValue::Map(btreemap! {
        "kind".to_string() => HostValue::from("shell"),
        "command".to_string() => HostValue::List(command.iter().map(|s| HostValue::from(*s)).collect()),
    })
}

/// Records commands instead of running them; exits 0 unless told otherwise
#[derive(Default)]
pub struct FakeRunner {
    commands: Mutex<Vec<Vec<String>>>,
    exit_codes: Mutex<HashMap<String, i32>>,
}

impl FakeRunner {
    pub fn exit_with(&self, program: &str, code: i32) {
        self.exit_codes.lock().insert(program.to_string(), code);
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().clone()
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, command: Vec<String>) -> ExitFuture {
        let code = command
            .first()
            .and_then(|program| self.exit_codes.lock().get(program).copied())
            .unwrap_or(0);
        self.commands.lock().push(command);
        Box::pin(async move { Ok(code) })
    }
}

pub fn collaborators(store: &Arc<InMemoryStore>, runner: &Arc<FakeRunner>) -> Collaborators {
    Collaborators::new(
        store.clone(),
        runner.clone(),
        tokio::runtime::Handle::current(),
    )
}
