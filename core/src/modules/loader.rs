//! Loading modules into a runtime

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{RegistrationError, ScriptError};
use crate::executor::{compile, CompileError, Prototype};
use crate::host::{report_error, BoundFunction, HostValue, Runtime, RuntimeBuilder};

use super::{HookName, ModuleAggregate, ModuleSource, PrototypeCache, HOOKS_PATH};

/// Loads module sets, reusing compiled prototypes across reloads
pub struct ModuleLoader {
    cache: PrototypeCache,
    hooks_path: String,
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self {
            cache: PrototypeCache::new(),
            hooks_path: HOOKS_PATH.to_string(),
        }
    }

    /// Use another reserved path for the lifecycle hooks module
    pub fn with_hooks_path(mut self, path: impl Into<String>) -> Self {
        self.hooks_path = path.into();
        self
    }

    pub fn hooks_path(&self) -> &str {
        &self.hooks_path
    }

    pub fn cache(&self) -> &PrototypeCache {
        &self.cache
    }

    pub fn load_all(&self, runtime: &Runtime, sources: &[ModuleSource]) -> ModuleAggregate {
        let prototypes = compile_cached(&self.cache, sources);
        load_compiled(runtime, sources, prototypes, &self.hooks_path)
    }

    /// Replace `previous` with a fresh runtime built from `builder`
    pub fn reload(
        &self,
        builder: &RuntimeBuilder,
        sources: &[ModuleSource],
        previous: Option<&ModuleAggregate>,
    ) -> Result<ModuleAggregate, RegistrationError> {
        let runtime = fresh_runtime(builder, previous)?;
        Ok(self.load_all(&runtime, sources))
    }
}

/// Load `sources` into `runtime` without a prototype cache
pub fn load_all(runtime: &Runtime, sources: &[ModuleSource]) -> ModuleAggregate {
    let prototypes = sources
        .par_iter()
        .map(|s| compile(&s.path, &s.source))
        .collect();
    load_compiled(runtime, sources, prototypes, HOOKS_PATH)
}

/// Retire `previous` and load `sources` into a new runtime, compiling
/// through `cache`
pub fn reload(
    builder: &RuntimeBuilder,
    sources: &[ModuleSource],
    cache: &PrototypeCache,
    previous: Option<&ModuleAggregate>,
) -> Result<ModuleAggregate, RegistrationError> {
    let runtime = fresh_runtime(builder, previous)?;
    let prototypes = compile_cached(cache, sources);
    Ok(load_compiled(&runtime, sources, prototypes, HOOKS_PATH))
}

/// Compile through `cache`, then drop entries for paths no longer present
fn compile_cached(
    cache: &PrototypeCache,
    sources: &[ModuleSource],
) -> Vec<Result<Prototype, CompileError>> {
    let prototypes = sources
        .par_iter()
        .map(|s| cache.get_or_compile(&s.path, &s.source))
        .collect();
    cache.retain_paths(sources.iter().map(|s| s.path.as_str()));
    prototypes
}

/// A new runtime; `previous` is retired only once it is built
fn fresh_runtime(
    builder: &RuntimeBuilder,
    previous: Option<&ModuleAggregate>,
) -> Result<Runtime, RegistrationError> {
    let runtime = builder.clone().build()?;
    if let Some(previous) = previous {
        previous.runtime().retire();
        info!(
            retired = previous.runtime().id(),
            runtime = runtime.id(),
            "runtime replaced"
        );
    }
    Ok(runtime)
}

/// Bind and run each module in order; failures are reported and skipped
fn load_compiled(
    runtime: &Runtime,
    sources: &[ModuleSource],
    prototypes: Vec<Result<Prototype, CompileError>>,
    hooks_path: &str,
) -> ModuleAggregate {
    let display = runtime.display();
    let mut aggregate = ModuleAggregate::new(runtime.clone());
    let mut failed = 0;

    for (source, prototype) in sources.iter().zip(prototypes) {
        match load_module(runtime, prototype) {
            Ok(table) => {
                debug!(path = %source.path, hooks = table.len(), "module loaded");
                aggregate.insert(&source.path, table, source.path == hooks_path);
            }
            Err(message) => {
                failed += 1;
                debug!(path = %source.path, error = %message, "module excluded");
                report_error(display.as_ref(), &source.path, &message);
            }
        }
    }

    info!(
        runtime = runtime.id(),
        loaded = aggregate.modules().len(),
        failed,
        "modules loaded"
    );
    aggregate
}

fn load_module(
    runtime: &Runtime,
    prototype: Result<Prototype, CompileError>,
) -> Result<Vec<(HookName, BoundFunction)>, String> {
    let prototype = prototype.map_err(|e| e.to_string())?;
    let function = runtime
        .bind(&prototype)
        .map_err(|e| ScriptError::from(e).to_string())?;
    let result = runtime
        .invoke_immediate(&function, vec![], None)
        .map_err(|e| e.to_string())?;
    hook_table(&result)
}

/// Recognized hooks of a module's result; unknown keys are ignored
fn hook_table(result: &HostValue) -> Result<Vec<(HookName, BoundFunction)>, String> {
    let Some(fields) = result.as_map() else {
        return Err(format!(
            "module must return an object of hooks, got {}",
            result.type_name()
        ));
    };
    let mut table = Vec::new();
    for (key, value) in fields {
        let Ok(hook) = key.parse::<HookName>() else {
            continue;
        };
        match value {
            HostValue::Function(f) => table.push((hook, f.clone())),
            other => {
                return Err(format!(
                    "hook '{}' must be a function, got {}",
                    key,
                    other.type_name()
                ))
            }
        }
    }
    Ok(table)
}
