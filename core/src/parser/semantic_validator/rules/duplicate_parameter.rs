//! Rule: Duplicate Parameter
//!
//! Reports an error when a function declares the same parameter name twice.
//!
//! ```edscript
//! // Error: duplicate parameter 'a'
//! function f(a, a) { return a }
//! ```

use std::collections::HashSet;

use crate::executor::types::ast::{FunctionDef, Stmt};
use crate::parser::ScriptDef;

use super::super::{ValidationError, ValidationRule};
use super::for_each_function_in_stmt;

pub struct DuplicateParameterRule;

impl ValidationRule for DuplicateParameterRule {
    fn id(&self) -> &'static str {
        "duplicate-parameter"
    }

    fn description(&self) -> &'static str {
        "Parameter names must be unique within a function"
    }

    fn validate(&self, script: &ScriptDef, _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        check_functions(&script.body, &mut errors, self.id());
        errors
    }
}

fn check_functions(body: &Stmt, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    for_each_function_in_stmt(body, &mut |def| {
        check_params(def, errors, rule_id);
        check_functions(&def.body, errors, rule_id);
    });
}

fn check_params(def: &FunctionDef, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    let mut seen = HashSet::new();
    for (i, param) in def.params.iter().enumerate() {
        if !seen.insert(param.as_str()) {
            let span = def.param_spans.get(i).copied().unwrap_or(def.span);
            errors.push(ValidationError::error(
                span,
                format!("Duplicate parameter '{}'", param),
                rule_id,
            ));
        }
    }
}
