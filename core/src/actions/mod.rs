//! Action executor
//!
//! Performs the side effects scripts describe. A batch is split into
//! partitions by `kind`, in order of first appearance, keeping the relative
//! order of actions inside each partition. Partitions run one after
//! another; each is validated in full before any of it runs. The first
//! failing partition stops the batch. Partitions that already ran are not
//! rolled back.

pub mod action;
pub mod process;
pub mod store;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::{info, warn};

use crate::deferred::Deferred;
use crate::error::ActionError;
use crate::host::HostValue;

pub use action::{Action, ActionKind, Mutation, Target};
pub use process::{ExitFuture, ProcessRunner, TokioProcessRunner};
pub use store::{InMemoryStore, PropertyStore, StoreSnapshot};

/// Host systems actions are executed against
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn PropertyStore>,
    pub runner: Arc<dyn ProcessRunner>,
    /// Runtime the batch is driven on
    pub handle: tokio::runtime::Handle,
}

impl Collaborators {
    pub fn new(
        store: Arc<dyn PropertyStore>,
        runner: Arc<dyn ProcessRunner>,
        handle: tokio::runtime::Handle,
    ) -> Self {
        Self {
            store,
            runner,
            handle,
        }
    }
}

/// Actions sharing a declared kind, with their positions in the batch
#[derive(Debug)]
pub(crate) struct Partition {
    pub kind: Option<String>,
    pub actions: Vec<(usize, HostValue)>,
}

pub(crate) fn partition(actions: Vec<HostValue>) -> Vec<Partition> {
    let mut partitions: Vec<Partition> = Vec::new();
    for (index, value) in actions.into_iter().enumerate() {
        let kind = action::declared_kind(&value);
        match partitions.iter_mut().find(|p| p.kind == kind) {
            Some(partition) => partition.actions.push((index, value)),
            None => partitions.push(Partition {
                kind,
                actions: vec![(index, value)],
            }),
        }
    }
    partitions
}

/// Perform a batch of script-produced actions
pub fn perform(actions: Vec<HostValue>, collaborators: &Collaborators) -> Deferred<(), ActionError> {
    if actions.is_empty() {
        return Deferred::completed(());
    }
    let partitions = partition(actions);
    let store = collaborators.store.clone();
    let runner = collaborators.runner.clone();

    Deferred::spawn_on(&collaborators.handle, async move {
        let total = partitions.len();
        for (n, partition) in partitions.into_iter().enumerate() {
            if let Err(e) = execute(partition, &store, runner.as_ref()).await {
                warn!(partition = n + 1, total, error = %e, "action partition failed");
                return Err(e);
            }
        }
        Ok(())
    })
}

async fn execute(
    partition: Partition,
    store: &Arc<dyn PropertyStore>,
    runner: &dyn ProcessRunner,
) -> Result<(), ActionError> {
    let actions = partition
        .actions
        .iter()
        .map(|(index, value)| Action::parse(*index, value))
        .collect::<Result<Vec<_>, _>>()?;
    let Some(kind) = actions.first().map(Action::kind) else {
        return Ok(());
    };
    info!(kind = %kind, count = actions.len(), "performing action partition");

    match kind {
        ActionKind::Set => {
            let mutations = actions
                .into_iter()
                .filter_map(|action| match action {
                    Action::Set(mutation) => Some(mutation),
                    Action::Shell { .. } => None,
                })
                .collect();
            let store = store.clone();
            tokio::task::spawn_blocking(move || store.transact(mutations))
                .await
                .map_err(|e| ActionError::Transaction(e.to_string()))?
                .map_err(|e| ActionError::Transaction(format!("{:#}", e)))
        }
        ActionKind::Shell => {
            for action in actions {
                let Action::Shell { command } = action else {
                    continue;
                };
                let line = command.join(" ");
                let code = runner
                    .run(command)
                    .await
                    .map_err(|e| ActionError::Spawn {
                        command: line.clone(),
                        message: format!("{:#}", e),
                    })?;
                if code != 0 {
                    return Err(ActionError::ExitStatus {
                        command: line,
                        code,
                    });
                }
            }
            Ok(())
        }
    }
}
