//! Hook tables merged from every loaded module

use std::collections::BTreeMap;
use std::iter::FusedIterator;

use crate::context::ExecutionContext;
use crate::host::{report_error, BoundFunction, HostValue, Runtime};

use super::HookName;

/// One module's function for a hook
#[derive(Debug, Clone)]
pub struct HookEntry {
    pub path: String,
    pub function: BoundFunction,
}

/// Functions registered for each hook, in module load order
#[derive(Debug)]
pub struct ModuleAggregate {
    runtime: Runtime,
    hooks: BTreeMap<HookName, Vec<HookEntry>>,
    lifecycle: Option<BTreeMap<HookName, HookEntry>>,
    modules: Vec<String>,
}

impl ModuleAggregate {
    pub(crate) fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            hooks: BTreeMap::new(),
            lifecycle: None,
            modules: Vec::new(),
        }
    }

    /// Add a loaded module's table; `lifecycle` marks the hooks module
    pub(crate) fn insert(&mut self, path: &str, table: Vec<(HookName, BoundFunction)>, lifecycle: bool) {
        if lifecycle {
            let hooks = self.lifecycle.get_or_insert_with(BTreeMap::new);
            for (hook, function) in &table {
                hooks.insert(
                    *hook,
                    HookEntry {
                        path: path.to_string(),
                        function: function.clone(),
                    },
                );
            }
        }
        for (hook, function) in table {
            self.hooks.entry(hook).or_default().push(HookEntry {
                path: path.to_string(),
                function,
            });
        }
        self.modules.push(path.to_string());
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Paths of the modules that loaded, in load order
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn hooks(&self, hook: HookName) -> &[HookEntry] {
        self.hooks.get(&hook).map(Vec::as_slice).unwrap_or_default()
    }

    /// The hooks module's table, when that module loaded
    pub fn lifecycle_hooks(&self) -> Option<&BTreeMap<HookName, HookEntry>> {
        self.lifecycle.as_ref()
    }

    pub fn lifecycle_hook(&self, hook: HookName) -> Option<&HookEntry> {
        self.lifecycle.as_ref()?.get(&hook)
    }
}

/* ===================== Calling hooks ===================== */

/// Call every function registered for `hook`, in load order
///
/// Calls are immediate and made lazily, one per `next()`. Entries that
/// fail are reported through the runtime's display output and skipped.
pub fn call_all(
    aggregate: &ModuleAggregate,
    hook: HookName,
    args: Vec<HostValue>,
    context: Option<&ExecutionContext>,
) -> HookResults {
    HookResults {
        runtime: aggregate.runtime.clone(),
        hook,
        entries: aggregate.hooks(hook).to_vec().into_iter(),
        args,
        context: context.cloned(),
    }
}

/// Successful `(path, result)` pairs of a `call_all`
pub struct HookResults {
    runtime: Runtime,
    hook: HookName,
    entries: std::vec::IntoIter<HookEntry>,
    args: Vec<HostValue>,
    context: Option<ExecutionContext>,
}

impl HookResults {
    pub fn hook(&self) -> HookName {
        self.hook
    }
}

impl Iterator for HookResults {
    type Item = (String, HostValue);

    fn next(&mut self) -> Option<Self::Item> {
        for entry in self.entries.by_ref() {
            match self
                .runtime
                .invoke_immediate(&entry.function, self.args.clone(), self.context.as_ref())
            {
                Ok(value) => return Some((entry.path, value)),
                Err(e) => report_error(self.runtime.display().as_ref(), &entry.path, &e.to_string()),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entries.len()))
    }
}

impl FusedIterator for HookResults {}
