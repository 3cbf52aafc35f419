//! Rule: Unreachable Code
//!
//! Warns about statements that follow a `return`, `throw`, `break` or
//! `continue` in the same block, or an `if` whose branches all exit.

use crate::executor::types::ast::Stmt;
use crate::parser::ScriptDef;

use super::super::{ValidationError, ValidationRule};
use super::for_each_function_in_stmt;

pub struct UnreachableCodeRule;

impl ValidationRule for UnreachableCodeRule {
    fn id(&self) -> &'static str {
        "unreachable-code"
    }

    fn description(&self) -> &'static str {
        "Code after an unconditional exit never runs"
    }

    fn validate(&self, script: &ScriptDef, _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        check_body(&script.body, &mut errors, self.id());
        errors
    }
}

fn check_body(body: &Stmt, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    check_stmt(body, errors, rule_id);
    for_each_function_in_stmt(body, &mut |def| check_body(&def.body, errors, rule_id));
}

/// Returns true when control never falls through `stmt`
fn check_stmt(stmt: &Stmt, errors: &mut Vec<ValidationError>, rule_id: &'static str) -> bool {
    match stmt {
        Stmt::Return { .. } | Stmt::Throw { .. } | Stmt::Break { .. } | Stmt::Continue { .. } => {
            true
        }
        Stmt::Block { body, .. } => {
            let mut exited = false;
            for s in body {
                if exited {
                    errors.push(ValidationError::warning(
                        s.span(),
                        "Unreachable code",
                        rule_id,
                    ));
                    // One warning per block
                    break;
                }
                exited = check_stmt(s, errors, rule_id);
            }
            exited
        }
        Stmt::If {
            then_s,
            else_s: Some(else_s),
            ..
        } => {
            let then_exits = check_stmt(then_s, errors, rule_id);
            let else_exits = check_stmt(else_s, errors, rule_id);
            then_exits && else_exits
        }
        Stmt::If { then_s, .. } => {
            check_stmt(then_s, errors, rule_id);
            false
        }
        Stmt::While { body, .. } | Stmt::ForLoop { body, .. } => {
            check_stmt(body, errors, rule_id);
            false
        }
        Stmt::Try {
            body, catch_body, ..
        } => {
            let body_exits = check_stmt(body, errors, rule_id);
            let catch_exits = check_stmt(catch_body, errors, rule_id);
            body_exits && catch_exits
        }
        _ => false,
    }
}
