//! Action payloads
//!
//! Scripts describe side effects as plain objects:
//! - `{kind = "set", target, property, value}` mutates one property
//! - `{kind = "shell", command = ["prog", "arg", ..]}` runs a process
//!
//! `target` is a node handle or a resource path string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ActionValidationError;
use crate::host::{Handle, HostValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Set,
    Shell,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Set => "set",
            ActionKind::Shell => "shell",
        }
    }
}

impl FromStr for ActionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(ActionKind::Set),
            "shell" => Ok(ActionKind::Shell),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a `set` action mutates
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    Node(Handle),
    Resource(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Node(handle) => write!(f, "node {}", handle.0),
            Target::Resource(path) => write!(f, "{}", path),
        }
    }
}

/// One property write
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub target: Target,
    pub property: String,
    pub value: HostValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Set(Mutation),
    Shell { command: Vec<String> },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Set(_) => ActionKind::Set,
            Action::Shell { .. } => ActionKind::Shell,
        }
    }

    /// Validate a script-produced payload; `index` is its position in the batch
    pub fn parse(index: usize, value: &HostValue) -> Result<Action, ActionValidationError> {
        let Some(fields) = value.as_map() else {
            return Err(ActionValidationError::NotAnObject {
                index,
                found: value.type_name(),
            });
        };
        let kind = match fields.get("kind") {
            None | Some(HostValue::Null) => {
                return Err(ActionValidationError::MissingKind { index })
            }
            Some(kind) => {
                let name = kind.as_str().map(str::to_string).unwrap_or_else(|| kind.to_string());
                name.parse::<ActionKind>()
                    .map_err(|()| ActionValidationError::UnknownKind { index, kind: name })?
            }
        };
        let field = |name: &'static str| match fields.get(name) {
            None | Some(HostValue::Null) => Err(ActionValidationError::MissingField {
                index,
                kind: kind.as_str(),
                field: name,
            }),
            Some(value) => Ok(value),
        };
        let invalid = |name: &'static str, expected: &'static str| {
            ActionValidationError::InvalidField {
                index,
                kind: kind.as_str(),
                field: name,
                expected,
            }
        };

        match kind {
            ActionKind::Set => {
                let target = match field("target")? {
                    HostValue::Handle(handle) => Target::Node(*handle),
                    HostValue::Str(path) if !path.is_empty() => Target::Resource(path.clone()),
                    _ => return Err(invalid("target", "a node handle or a resource path")),
                };
                let property = match field("property")? {
                    HostValue::Str(name) if !name.is_empty() => name.clone(),
                    _ => return Err(invalid("property", "a non-empty string")),
                };
                // Absent and null both clear the property
                let value = fields.get("value").cloned().unwrap_or(HostValue::Null);
                if matches!(value, HostValue::Function(_)) {
                    return Err(invalid("value", "plain data"));
                }
                Ok(Action::Set(Mutation {
                    target,
                    property,
                    value,
                }))
            }
            ActionKind::Shell => {
                let command = field("command")?
                    .as_list()
                    .and_then(|args| {
                        args.iter()
                            .map(|arg| arg.as_str().map(str::to_string))
                            .collect::<Option<Vec<_>>>()
                    })
                    .filter(|args| !args.is_empty())
                    .ok_or_else(|| invalid("command", "a non-empty list of strings"))?;
                Ok(Action::Shell { command })
            }
        }
    }
}

/// Kind declared by a payload, before validation
pub(crate) fn declared_kind(value: &HostValue) -> Option<String> {
    match value.get("kind")? {
        HostValue::Null => None,
        HostValue::Str(kind) => Some(kind.clone()),
        other => Some(other.to_string()),
    }
}
