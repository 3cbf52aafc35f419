//! Runtime: one interpreter and its host functions

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::debug;

use super::convert;
use super::display::{DisplayOutput, OutputKind, TracingDisplay};
use super::function::{BoundFunction, HostFunction};
use super::value::HostValue;
use crate::context::EvaluationSource;
use crate::error::{BindError, ConversionError, RegistrationError};
use crate::executor::{main_closure, new_globals, Globals, HostFnId, NativeFn, Prototype, Val};

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Interpreter state; only touched with the runtime lock held
pub(crate) struct Interp {
    pub(crate) globals: Globals,
}

pub(crate) struct RuntimeInner {
    pub(crate) id: u64,
    pub(crate) interp: ReentrantMutex<RefCell<Interp>>,
    /// Indexed by `HostFnId`
    pub(crate) functions: Vec<(String, HostFunction)>,
    pub(crate) display: Arc<dyn DisplayOutput>,
    pub(crate) source: Option<Arc<dyn EvaluationSource>>,
    retired: AtomicBool,
}

/// Handle to one interpreter instance
///
/// Cheap to clone; every clone refers to the same interpreter. All entry
/// points serialize on one reentrant lock.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Arc<RuntimeInner>,
}

/* ===================== Builder ===================== */

/// Configuration of a runtime: host functions, output sinks and the
/// evaluation snapshot source
#[derive(Clone, Default)]
pub struct RuntimeBuilder {
    functions: Vec<(String, HostFunction)>,
    display: Option<Arc<dyn DisplayOutput>>,
    source: Option<Arc<dyn EvaluationSource>>,
}

impl RuntimeBuilder {
    /// Register a host function under a dotted name (`editor.get`)
    pub fn function(mut self, name: impl Into<String>, function: HostFunction) -> Self {
        self.functions.push((name.into(), function));
        self
    }

    pub fn functions<I>(mut self, functions: I) -> Self
    where
        I: IntoIterator<Item = (String, HostFunction)>,
    {
        self.functions.extend(functions);
        self
    }

    pub fn display(mut self, display: Arc<dyn DisplayOutput>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn evaluation_source(mut self, source: Arc<dyn EvaluationSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn build(self) -> Result<Runtime, RegistrationError> {
        let id = NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed);
        let display = self
            .display
            .unwrap_or_else(|| Arc::new(TracingDisplay) as Arc<dyn DisplayOutput>);

        let mut functions = vec![("print".to_string(), print_function(display.clone()))];
        functions.extend(self.functions);

        let mut globals = new_globals();
        for (index, (name, _)) in functions.iter().enumerate() {
            let id = u32::try_from(index).map_err(|_| RegistrationError {
                name: name.clone(),
                reason: "too many host functions".to_string(),
            })?;
            install(&mut globals, name, Val::NativeFunc(NativeFn::Host(HostFnId(id))))?;
        }

        debug!(runtime = id, functions = functions.len(), "runtime created");

        Ok(Runtime {
            inner: Arc::new(RuntimeInner {
                id,
                interp: ReentrantMutex::new(RefCell::new(Interp { globals })),
                functions,
                display,
                source: self.source,
                retired: AtomicBool::new(false),
            }),
        })
    }
}

fn print_function(display: Arc<dyn DisplayOutput>) -> HostFunction {
    HostFunction::plain(move |_ctx, args| {
        let line = args
            .iter()
            .map(|arg| arg.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        display.write(OutputKind::Out, &line);
        Ok(HostValue::Null)
    })
}

/// Put `value` at a dotted path, creating namespace objects on the way
fn install(globals: &mut Globals, name: &str, value: Val) -> Result<(), RegistrationError> {
    let error = |reason: &str| RegistrationError {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let segments: Vec<&str> = name.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(error("empty name segment"));
    }
    let Some((last, namespaces)) = segments.split_last() else {
        return Err(error("empty name"));
    };
    let Some((first, nested)) = namespaces.split_first() else {
        globals.insert(last.to_string(), value);
        return Ok(());
    };

    let mut namespace = match globals
        .entry(first.to_string())
        .or_insert_with(|| Val::obj(BTreeMap::new()))
    {
        Val::Obj(fields) => fields.clone(),
        _ => return Err(error(&format!("'{}' is not a namespace", first))),
    };
    for segment in nested {
        let next = {
            let mut fields = namespace.lock();
            match fields
                .entry(segment.to_string())
                .or_insert_with(|| Val::obj(BTreeMap::new()))
            {
                Val::Obj(inner) => inner.clone(),
                _ => return Err(error(&format!("'{}' is not a namespace", segment))),
            }
        };
        namespace = next;
    }
    namespace.lock().insert(last.to_string(), value);
    Ok(())
}

/* ===================== Runtime ===================== */

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn display(&self) -> Arc<dyn DisplayOutput> {
        self.inner.display.clone()
    }

    pub fn evaluation_source(&self) -> Option<Arc<dyn EvaluationSource>> {
        self.inner.source.clone()
    }

    /// Mark this runtime as replaced; it can no longer bind prototypes
    pub fn retire(&self) {
        self.inner.retired.store(true, Ordering::SeqCst);
        debug!(runtime = self.inner.id, "runtime retired");
    }

    pub fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::SeqCst)
    }

    /// Bind a prototype's top-level body to this runtime's globals
    pub fn bind(&self, prototype: &Prototype) -> Result<BoundFunction, BindError> {
        if self.is_retired() {
            return Err(BindError::Retired {
                path: prototype.path().to_string(),
            });
        }
        Ok(BoundFunction::new(self.inner.id, main_closure(prototype)))
    }

    pub fn to_host_value(&self, value: &Val) -> Result<HostValue, ConversionError> {
        convert::to_host(self.inner.id, value)
    }

    pub fn to_script_value(&self, value: &HostValue) -> Result<Val, ConversionError> {
        convert::to_script(self.inner.id, value)
    }

    /// Read a global; missing globals read as null
    pub fn global(&self, name: &str) -> Result<HostValue, ConversionError> {
        let guard = self.lock();
        let value = guard.borrow().globals.get(name).cloned();
        drop(guard);
        match value {
            Some(value) => self.to_host_value(&value),
            None => Ok(HostValue::Null),
        }
    }

    pub fn set_global(&self, name: &str, value: &HostValue) -> Result<(), ConversionError> {
        let value = self.to_script_value(value)?;
        let guard = self.lock();
        guard.borrow_mut().globals.insert(name.to_string(), value);
        Ok(())
    }

    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<Interp>> {
        self.inner.interp.lock()
    }

    pub(crate) fn host_function(&self, id: HostFnId) -> Option<&(String, HostFunction)> {
        self.inner.functions.get(id.0 as usize)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.inner.id)
            .field("functions", &self.inner.functions.len())
            .field("retired", &self.is_retired())
            .finish()
    }
}
