//! Editor host functions
//!
//! The `editor` namespace scripts use to read and change editor state:
//! - `editor.get(target, property)` reads from the context's snapshot
//! - `editor.transact([set actions])` applies property writes as one
//!   transaction, then refreshes the snapshot
//! - `editor.execute(command)` runs an external command and returns its
//!   exit code

use std::sync::Arc;

use crate::actions::{self, Collaborators, StoreSnapshot, Target};
use crate::context::ExecutionContext;
use crate::deferred::{self, Deferred};
use crate::error::HostError;
use crate::host::{HostFunction, HostValue};

/// Every `editor.*` function, ready for `RuntimeBuilder::functions`
pub fn editor_functions(collaborators: &Collaborators) -> Vec<(String, HostFunction)> {
    let transact_with = collaborators.clone();
    let execute_with = collaborators.clone();
    vec![
        ("editor.get".to_string(), HostFunction::plain(get)),
        (
            "editor.transact".to_string(),
            HostFunction::suspendable(move |ctx, args| transact(&transact_with, ctx, args)),
        ),
        (
            "editor.execute".to_string(),
            HostFunction::suspendable(move |_ctx, args| execute(&execute_with, args)),
        ),
    ]
}

fn expect_args(name: &str, args: &[HostValue], count: usize) -> Result<(), HostError> {
    if args.len() != count {
        return Err(HostError::new(format!(
            "{}: expected {} arguments, got {}",
            name,
            count,
            args.len()
        )));
    }
    Ok(())
}

/// editor.get(target, property) - Property value, or null when unset
fn get(ctx: &ExecutionContext, args: Vec<HostValue>) -> Result<HostValue, HostError> {
    expect_args("editor.get", &args, 2)?;
    let target = match &args[0] {
        HostValue::Handle(handle) => Target::Node(*handle),
        HostValue::Str(path) => Target::Resource(path.clone()),
        other => {
            return Err(HostError::new(format!(
                "editor.get: target must be a node handle or a resource path, got {}",
                other.type_name()
            )))
        }
    };
    let Some(property) = args[1].as_str() else {
        return Err(HostError::new("editor.get: property must be a string"));
    };
    let snapshot: Arc<StoreSnapshot> = ctx
        .snapshot()
        .downcast()
        .ok_or_else(|| HostError::new("editor.get: no editor state is available"))?;
    Ok(snapshot.get(&target, property).cloned().unwrap_or(HostValue::Null))
}

/// editor.transact(actions) - Apply `set` actions as one transaction
///
/// Requests a snapshot refresh once applied, so later reads in the same
/// call see the writes.
fn transact(
    collaborators: &Collaborators,
    ctx: &ExecutionContext,
    args: Vec<HostValue>,
) -> Deferred<HostValue, HostError> {
    if let Err(e) = expect_args("editor.transact", &args, 1) {
        return Deferred::failed(e);
    }
    let Some(HostValue::List(batch)) = args.into_iter().next() else {
        return Deferred::failed(HostError::new("editor.transact: expected a list of actions"));
    };
    if let Some(kind) = batch
        .iter()
        .map(|a| actions::action::declared_kind(a).unwrap_or_default())
        .find(|kind| kind != "set")
    {
        return Deferred::failed(HostError::new(format!(
            "editor.transact: only 'set' actions can be applied, got '{}'",
            kind
        )));
    }

    let ctx = ctx.clone();
    let (resolver, deferred) = deferred::pending();
    actions::perform(batch, collaborators).on_complete(move |result| match result {
        Ok(()) => {
            ctx.request_refresh();
            resolver.complete(HostValue::Null);
        }
        Err(e) => resolver.fail(e.into()),
    });
    deferred
}

/// editor.execute(command) - Run a command and return its exit code
fn execute(collaborators: &Collaborators, args: Vec<HostValue>) -> Deferred<HostValue, HostError> {
    if let Err(e) = expect_args("editor.execute", &args, 1) {
        return Deferred::failed(e);
    }
    let command = args[0]
        .as_list()
        .and_then(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .filter(|command| !command.is_empty());
    let Some(command) = command else {
        return Deferred::failed(HostError::new(
            "editor.execute: command must be a non-empty list of strings",
        ));
    };

    let runner = collaborators.runner.clone();
    Deferred::spawn_on(&collaborators.handle, async move {
        let code = runner.run(command).await?;
        Ok(HostValue::Int(i64::from(code)))
    })
}

#[cfg(test)]
mod tests;
