//! Validation Rules
//!
//! Each file in this module contains one validation rule:
//!
//! - `loop_control.rs` - `break`/`continue` outside of a loop
//! - `duplicate_parameter.rs` - a parameter name repeated in one function
//! - `unreachable_code.rs` - statements after `return`, `throw`, `break` or `continue`

mod duplicate_parameter;
mod loop_control;
mod unreachable_code;

pub use duplicate_parameter::DuplicateParameterRule;
pub use loop_control::LoopControlRule;
pub use unreachable_code::UnreachableCodeRule;

use crate::executor::types::ast::{Expr, FunctionDef, MemberAccess, Stmt};

/// Call `visit` for every function literal nested anywhere in `stmt`.
pub(crate) fn for_each_function_in_stmt(stmt: &Stmt, visit: &mut dyn FnMut(&FunctionDef)) {
    match stmt {
        Stmt::Block { body, .. } => {
            for s in body {
                for_each_function_in_stmt(s, visit);
            }
        }
        Stmt::Declare { init, .. } => {
            if let Some(init) = init {
                for_each_function_in_expr(init, visit);
            }
        }
        Stmt::Function { def, .. } => {
            visit(def);
        }
        Stmt::Assign { path, value, .. } => {
            for segment in path {
                if let MemberAccess::Index { expr, .. } = segment {
                    for_each_function_in_expr(expr, visit);
                }
            }
            for_each_function_in_expr(value, visit);
        }
        Stmt::If {
            test,
            then_s,
            else_s,
            ..
        } => {
            for_each_function_in_expr(test, visit);
            for_each_function_in_stmt(then_s, visit);
            if let Some(else_s) = else_s {
                for_each_function_in_stmt(else_s, visit);
            }
        }
        Stmt::While { test, body, .. } => {
            for_each_function_in_expr(test, visit);
            for_each_function_in_stmt(body, visit);
        }
        Stmt::ForLoop { iterable, body, .. } => {
            for_each_function_in_expr(iterable, visit);
            for_each_function_in_stmt(body, visit);
        }
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                for_each_function_in_expr(value, visit);
            }
        }
        Stmt::Throw { value, .. } => for_each_function_in_expr(value, visit),
        Stmt::Try {
            body, catch_body, ..
        } => {
            for_each_function_in_stmt(body, visit);
            for_each_function_in_stmt(catch_body, visit);
        }
        Stmt::Expr { expr, .. } => for_each_function_in_expr(expr, visit),
        Stmt::Break { .. } | Stmt::Continue { .. } => {}
    }
}

/// Call `visit` for every function literal nested anywhere in `expr`.
pub(crate) fn for_each_function_in_expr(expr: &Expr, visit: &mut dyn FnMut(&FunctionDef)) {
    match expr {
        Expr::Function { def, .. } => visit(def),
        Expr::LitList { elements, .. } => {
            for e in elements {
                for_each_function_in_expr(e, visit);
            }
        }
        Expr::LitObj { properties, .. } => {
            for (_, _, value) in properties {
                for_each_function_in_expr(value, visit);
            }
        }
        Expr::Member { object, .. } => for_each_function_in_expr(object, visit),
        Expr::Index { object, index, .. } => {
            for_each_function_in_expr(object, visit);
            for_each_function_in_expr(index, visit);
        }
        Expr::Call { callee, args, .. } => {
            for_each_function_in_expr(callee, visit);
            for arg in args {
                for_each_function_in_expr(arg, visit);
            }
        }
        Expr::Unary { operand, .. } => for_each_function_in_expr(operand, visit),
        Expr::BinaryOp { left, right, .. } => {
            for_each_function_in_expr(left, visit);
            for_each_function_in_expr(right, visit);
        }
        Expr::Ternary {
            condition,
            consequent,
            alternate,
            ..
        } => {
            for_each_function_in_expr(condition, visit);
            for_each_function_in_expr(consequent, visit);
            for_each_function_in_expr(alternate, visit);
        }
        Expr::LitBool { .. }
        | Expr::LitNum { .. }
        | Expr::LitStr { .. }
        | Expr::LitNull { .. }
        | Expr::Ident { .. } => {}
    }
}
