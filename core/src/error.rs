//! Errors crossing the boundary between host code and scripts

use thiserror::Error;

use crate::deferred::Abandon;
use crate::executor::{CompileError, RuntimeError};

/// Why an invocation through a `Runtime` failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// A suspendable host function was reached during an immediate call
    #[error("cannot call suspendable function '{function}' in immediate context")]
    SuspensionPolicy { function: String },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("function belongs to a different runtime")]
    ForeignFunction,

    #[error("execution context belongs to a different runtime")]
    ForeignContext,

    #[error("call was abandoned before it completed")]
    Abandoned,
}

impl ScriptError {
    pub fn is_suspension_policy(&self) -> bool {
        matches!(self, ScriptError::SuspensionPolicy { .. })
    }
}

impl Abandon for ScriptError {
    fn abandoned() -> Self {
        ScriptError::Abandoned
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("cannot bind '{path}': runtime was retired by a reload")]
    Retired { path: String },
}

/// A value that cannot cross between host and script without losing meaning
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("integer {0} is outside the safe range of script numbers; pass it as a handle")]
    UnsafeInteger(i64),

    #[error("{0} values cannot be passed to the host")]
    Unsupported(&'static str),

    #[error("function belongs to a different runtime")]
    ForeignFunction,

    #[error("value is nested more than {0} levels deep")]
    TooDeep(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot register host function '{name}': {reason}")]
pub struct RegistrationError {
    pub name: String,
    pub reason: String,
}

/// Failure of a host function
///
/// Only the message reaches the script: it is raised there as a plain string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HostError {
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<anyhow::Error> for HostError {
    fn from(e: anyhow::Error) -> Self {
        HostError::new(format!("{:#}", e))
    }
}

impl From<ConversionError> for HostError {
    fn from(e: ConversionError) -> Self {
        HostError::new(e.to_string())
    }
}

impl Abandon for HostError {
    fn abandoned() -> Self {
        HostError::new("host operation was abandoned before it completed")
    }
}

/* ===================== Actions ===================== */

/// A malformed action payload; the partition holding it is not executed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionValidationError {
    #[error("action #{index} is a {found}, expected an object")]
    NotAnObject { index: usize, found: &'static str },

    #[error("action #{index} has no 'kind'")]
    MissingKind { index: usize },

    #[error("action #{index} has unknown kind '{kind}'")]
    UnknownKind { index: usize, kind: String },

    #[error("action #{index} ({kind}) is missing '{field}'")]
    MissingField {
        index: usize,
        kind: &'static str,
        field: &'static str,
    },

    #[error("action #{index} ({kind}): '{field}' must be {expected}")]
    InvalidField {
        index: usize,
        kind: &'static str,
        field: &'static str,
        expected: &'static str,
    },
}

/// Why `actions::perform` stopped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error(transparent)]
    Validation(#[from] ActionValidationError),

    #[error("property transaction failed: {0}")]
    Transaction(String),

    #[error("failed to run '{command}': {message}")]
    Spawn { command: String, message: String },

    #[error("'{command}' exited with status {code}")]
    ExitStatus { command: String, code: i32 },

    #[error("actions were abandoned before they completed")]
    Abandoned,
}

impl Abandon for ActionError {
    fn abandoned() -> Self {
        ActionError::Abandoned
    }
}

impl From<ActionError> for HostError {
    fn from(e: ActionError) -> Self {
        HostError::new(e.to_string())
    }
}

/* ===================== Hooks ===================== */

/// Failure of a lifecycle hook run
///
/// `path` is the hooks module; messages do not repeat it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HookError {
    #[error("{source}")]
    Script {
        path: String,
        #[source]
        source: ScriptError,
    },

    #[error("{source}")]
    Action {
        path: String,
        #[source]
        source: ActionError,
    },

    #[error("hook '{hook}' returned a {found}, expected a list of actions or null")]
    InvalidResult {
        path: String,
        hook: String,
        found: &'static str,
    },

    #[error("hook run was abandoned before it completed")]
    Abandoned,
}

impl Abandon for HookError {
    fn abandoned() -> Self {
        HookError::Abandoned
    }
}
