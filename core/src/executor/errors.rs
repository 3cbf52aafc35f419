//! Errors produced by compiling and running scripts

use std::fmt;

/// Malformed source: a parse failure, a validation error or a scoping error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub path: String,
    /// 1-indexed line, when known
    pub line: Option<u32>,
    pub message: String,
}

impl CompileError {
    pub fn new(path: &str, line: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.path, line, self.message),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

impl std::error::Error for CompileError {}

/// A value thrown by a script and not caught
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    /// The thrown value, rendered as a string
    pub message: String,
    /// Chunk the throw originated in
    pub path: String,
    /// 1-indexed line of the throw site
    pub line: u32,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, path: &str, line: u32) -> Self {
        Self {
            message: message.into(),
            path: path.to_string(),
            line,
        }
    }

    /// Errors raised by the interpreter itself already carry their location
    fn has_location(&self) -> bool {
        self.message
            .strip_prefix(self.path.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_location() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}:{}: {}", self.path, self.line, self.message)
        }
    }
}

impl std::error::Error for RuntimeError {}
