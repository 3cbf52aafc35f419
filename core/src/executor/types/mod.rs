//! Core types for the edscript executor

pub mod ast;
pub mod phase;
pub mod values;

pub use ast::{BinaryOp, Expr, ForLoopKind, FunctionDef, MemberAccess, Span, Stmt, UnaryOp, VarKind};
pub use phase::{CallMode, Phase};
pub use values::{Closure, CoroutineRef, HostFnId, ListRef, NativeFn, ObjRef, Val};
