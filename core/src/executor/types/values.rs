//! Runtime value types

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::super::proto::Proto;
use super::super::stdlib::StdlibFunc;
use super::super::vm::Coroutine;

pub type ListRef = Arc<Mutex<Vec<Val>>>;
pub type ObjRef = Arc<Mutex<BTreeMap<String, Val>>>;
pub type CoroutineRef = Arc<Mutex<Coroutine>>;

/// Index into the owning runtime's host function table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostFnId(pub u32);

/// Functions implemented outside of script code
#[derive(Debug, Clone, PartialEq)]
pub enum NativeFn {
    Stdlib(StdlibFunc),
    Host(HostFnId),
}

/// A compiled function plus the values it captured when it was created
pub struct Closure {
    pub proto: Arc<Proto>,
    pub captures: Vec<Val>,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure({})", self.proto.name)
    }
}

/// Runtime value type
///
/// Lists and objects are shared, mutable references: assigning one to two
/// variables aliases it. Everything else is a plain value.
#[derive(Debug, Clone)]
pub enum Val {
    Null,
    Bool(bool),
    Num(f64),
    Str(Arc<str>),
    /// Opaque host identifier (node ids and other large integers)
    Handle(i64),
    List(ListRef),
    Obj(ObjRef),
    Func(Arc<Closure>),
    NativeFunc(NativeFn),
    Coroutine(CoroutineRef),
}

impl Val {
    pub fn str(s: impl AsRef<str>) -> Val {
        Val::Str(Arc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Val>) -> Val {
        Val::List(Arc::new(Mutex::new(items)))
    }

    pub fn obj(fields: BTreeMap<String, Val>) -> Val {
        Val::Obj(Arc::new(Mutex::new(fields)))
    }

    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Bool(b) => *b,
            Val::Null => false,
            _ => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Val::Func(_) | Val::NativeFunc(_))
    }

    /// Name reported by `type()` and in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::Handle(_) => "handle",
            Val::List(_) => "list",
            Val::Obj(_) => "object",
            Val::Func(_) | Val::NativeFunc(_) => "function",
            Val::Coroutine(_) => "coroutine",
        }
    }
}

/// Integral numbers print without a fractional part
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Null => write!(f, "null"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::Num(n) => write!(f, "{}", format_number(*n)),
            Val::Str(s) => write!(f, "{}", s),
            Val::Handle(h) => write!(f, "handle: {}", h),
            Val::List(l) => write!(f, "list: {:p}", Arc::as_ptr(l)),
            Val::Obj(o) => write!(f, "object: {:p}", Arc::as_ptr(o)),
            Val::Func(c) => write!(f, "function: {}", c.proto.name),
            Val::NativeFunc(NativeFn::Stdlib(func)) => write!(f, "function: {}", func.name()),
            Val::NativeFunc(NativeFn::Host(id)) => write!(f, "function: host#{}", id.0),
            Val::Coroutine(c) => write!(f, "coroutine: {:p}", Arc::as_ptr(c)),
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Null, Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Num(a), Val::Num(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::Handle(a), Val::Handle(b)) => a == b,
            (Val::List(a), Val::List(b)) => Arc::ptr_eq(a, b),
            (Val::Obj(a), Val::Obj(b)) => Arc::ptr_eq(a, b),
            (Val::Func(a), Val::Func(b)) => Arc::ptr_eq(a, b),
            (Val::NativeFunc(a), Val::NativeFunc(b)) => a == b,
            (Val::Coroutine(a), Val::Coroutine(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<f64> for Val {
    fn from(n: f64) -> Self {
        Val::Num(n)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::str(s)
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(Arc::from(s))
    }
}
