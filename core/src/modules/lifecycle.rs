//! Lifecycle hooks of the hooks module

use crate::actions::{self, Collaborators};
use crate::deferred::{self, Deferred, Resolver};
use crate::error::HookError;
use crate::host::{report_error, DisplayOutput, HostValue};

use super::{HookName, ModuleAggregate};

/// Run the hooks module's function for `hook` in a suspending context
///
/// A returned list is performed as actions. A failure is reported through
/// the display output and also fails the returned deferred. Completes
/// immediately when the hooks module has no such hook.
pub fn run_lifecycle_hook(
    aggregate: &ModuleAggregate,
    hook: HookName,
    args: Vec<HostValue>,
    collaborators: &Collaborators,
) -> Deferred<(), HookError> {
    let Some(entry) = aggregate.lifecycle_hook(hook) else {
        return Deferred::completed(());
    };
    let runtime = aggregate.runtime().clone();
    let run = HookRun {
        path: entry.path.clone(),
        display: runtime.display(),
    };
    let collaborators = collaborators.clone();
    let (resolver, deferred) = deferred::pending();

    runtime
        .invoke_suspending(&entry.function, args)
        .on_complete(move |result| {
            let actions = match result {
                Ok(HostValue::Null) => return resolver.complete(()),
                Ok(HostValue::List(actions)) => actions,
                Ok(other) => {
                    let error = HookError::InvalidResult {
                        path: run.path.clone(),
                        hook: hook.to_string(),
                        found: other.type_name(),
                    };
                    return run.fail(resolver, error);
                }
                Err(source) => {
                    let error = HookError::Script {
                        path: run.path.clone(),
                        source,
                    };
                    return run.fail(resolver, error);
                }
            };
            actions::perform(actions, &collaborators).on_complete(move |result| match result {
                Ok(()) => resolver.complete(()),
                Err(source) => {
                    let error = HookError::Action {
                        path: run.path.clone(),
                        source,
                    };
                    run.fail(resolver, error)
                }
            });
        });
    deferred
}

struct HookRun {
    path: String,
    display: std::sync::Arc<dyn DisplayOutput>,
}

impl HookRun {
    fn fail(&self, resolver: Resolver<(), HookError>, error: HookError) {
        report_error(self.display.as_ref(), &self.path, &error.to_string());
        resolver.fail(error);
    }
}
