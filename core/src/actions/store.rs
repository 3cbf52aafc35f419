//! Property store collaborator

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Result};
use parking_lot::RwLock;
use tracing::debug;

use super::action::{Mutation, Target};
use crate::context::{EvaluationSource, Snapshot};
use crate::host::HostValue;

/// Applies property mutations
///
/// `transact` is all or nothing: an error means no mutation was applied.
pub trait PropertyStore: Send + Sync {
    fn transact(&self, mutations: Vec<Mutation>) -> Result<()>;
}

type Properties = BTreeMap<(Target, String), HostValue>;

/// Frozen view of an `InMemoryStore`, handed to scripts through the
/// execution context
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    version: u64,
    properties: Arc<Properties>,
}

impl StoreSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, target: &Target, property: &str) -> Option<&HostValue> {
        self.properties.get(&(target.clone(), property.to_string()))
    }
}

#[derive(Default)]
struct StoreState {
    version: u64,
    properties: Arc<Properties>,
}

/// In-process property store, versioned per committed transaction
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    read_only: RwLock<HashSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &Target, property: &str) -> Option<HostValue> {
        self.state
            .read()
            .properties
            .get(&(target.clone(), property.to_string()))
            .cloned()
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Reject every transaction that writes `property`
    pub fn make_read_only(&self, property: impl Into<String>) {
        self.read_only.write().insert(property.into());
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        StoreSnapshot {
            version: state.version,
            properties: state.properties.clone(),
        }
    }
}

impl PropertyStore for InMemoryStore {
    fn transact(&self, mutations: Vec<Mutation>) -> Result<()> {
        {
            let read_only = self.read_only.read();
            if let Some(m) = mutations.iter().find(|m| read_only.contains(&m.property)) {
                bail!("property '{}' of {} is read-only", m.property, m.target);
            }
        }

        let mut state = self.state.write();
        let mut properties = (*state.properties).clone();
        let count = mutations.len();
        for Mutation {
            target,
            property,
            value,
        } in mutations
        {
            if value.is_null() {
                properties.remove(&(target, property));
            } else {
                properties.insert((target, property), value);
            }
        }
        state.properties = Arc::new(properties);
        state.version += 1;
        debug!(version = state.version, mutations = count, "store transaction committed");
        Ok(())
    }
}

impl EvaluationSource for InMemoryStore {
    fn snapshot(&self) -> Snapshot {
        Snapshot::new(InMemoryStore::snapshot(self))
    }
}
