//! Checks run on a parsed script before it is compiled
//!
//! The grammar accepts some scripts that cannot run, like a `break` with no
//! loop around it. Each check is a `ValidationRule` in `rules/`; `compile`
//! rejects a script when any rule reports an error. Warnings are kept for
//! tooling and never stop compilation.

pub mod rules;

use std::fmt;

use crate::executor::types::ast::Span;

use super::ScriptDef;

/* ===================== Findings ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The script is rejected
    Error,
    Warning,
}

/// One problem found by a rule
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub span: Span,
    pub message: String,
    pub severity: Severity,
    pub rule_id: &'static str,
}

impl ValidationError {
    pub fn error(span: Span, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self::with_severity(Severity::Error, span, message, rule_id)
    }

    pub fn warning(span: Span, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self::with_severity(Severity::Warning, span, message, rule_id)
    }

    fn with_severity(
        severity: Severity,
        span: Span,
        message: impl Into<String>,
        rule_id: &'static str,
    ) -> Self {
        Self {
            span,
            message: message.into(),
            severity,
            rule_id,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "line {}:{}: {} ({}, {})",
            self.span.line(),
            self.span.start_col + 1,
            self.message,
            level,
            self.rule_id
        )
    }
}

impl std::error::Error for ValidationError {}

/* ===================== Rules ===================== */

pub trait ValidationRule: Send + Sync {
    /// Stable identifier reported with each finding, e.g. "loop-control"
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn validate(&self, script: &ScriptDef, source: &str) -> Vec<ValidationError>;
}

static RULES: &[&dyn ValidationRule] = &[
    &rules::LoopControlRule,
    &rules::DuplicateParameterRule,
    &rules::UnreachableCodeRule,
];

/// `(id, description)` of every rule, in the order they run
pub fn rule_ids() -> impl Iterator<Item = (&'static str, &'static str)> {
    RULES.iter().map(|rule| (rule.id(), rule.description()))
}

/// Every finding of every rule, errors and warnings alike
pub fn validate_script(script: &ScriptDef, source: &str) -> Vec<ValidationError> {
    RULES
        .iter()
        .flat_map(|rule| rule.validate(script, source))
        .collect()
}

pub fn has_errors(script: &ScriptDef, source: &str) -> bool {
    validate_script(script, source).iter().any(ValidationError::is_error)
}
