//! Rule: Loop Control
//!
//! Reports an error when `break` or `continue` appears outside of a loop.
//! A function body starts a fresh context, so a `break` inside a function
//! declared in a loop body is still an error.
//!
//! ```edscript
//! // Error: 'break' outside of a loop
//! if (done) { break }
//! ```

use crate::executor::types::ast::Stmt;
use crate::parser::ScriptDef;

use super::super::{ValidationError, ValidationRule};
use super::for_each_function_in_stmt;

pub struct LoopControlRule;

impl ValidationRule for LoopControlRule {
    fn id(&self) -> &'static str {
        "loop-control"
    }

    fn description(&self) -> &'static str {
        "break and continue must appear inside a loop"
    }

    fn validate(&self, script: &ScriptDef, _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        check_body(&script.body, &mut errors, self.id());
        errors
    }
}

fn check_body(body: &Stmt, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    check_stmt(body, false, errors, rule_id);
    for_each_function_in_stmt(body, &mut |def| check_body(&def.body, errors, rule_id));
}

fn check_stmt(stmt: &Stmt, in_loop: bool, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match stmt {
        Stmt::Break { span } if !in_loop => {
            errors.push(ValidationError::error(
                *span,
                "'break' outside of a loop",
                rule_id,
            ));
        }
        Stmt::Continue { span } if !in_loop => {
            errors.push(ValidationError::error(
                *span,
                "'continue' outside of a loop",
                rule_id,
            ));
        }
        Stmt::Block { body, .. } => {
            for s in body {
                check_stmt(s, in_loop, errors, rule_id);
            }
        }
        Stmt::If { then_s, else_s, .. } => {
            check_stmt(then_s, in_loop, errors, rule_id);
            if let Some(else_s) = else_s {
                check_stmt(else_s, in_loop, errors, rule_id);
            }
        }
        Stmt::While { body, .. } | Stmt::ForLoop { body, .. } => {
            check_stmt(body, true, errors, rule_id);
        }
        Stmt::Try {
            body, catch_body, ..
        } => {
            check_stmt(body, in_loop, errors, rule_id);
            check_stmt(catch_body, in_loop, errors, rule_id);
        }
        _ => {}
    }
}
