pub mod actions;
pub mod cli;
pub mod config;
pub mod context;
pub mod deferred;
pub mod dispatch;
pub mod editor_lib;
pub mod error;
pub mod executor;
pub mod host;
pub mod modules;
pub mod parser;

// Re-export main types
pub use context::{EvaluationSource, ExecutionContext, Snapshot};
pub use deferred::Deferred;
pub use error::{HostError, ScriptError};
pub use executor::{compile, CallMode, Prototype};
pub use host::{BoundFunction, HostFunction, HostValue, Runtime, RuntimeBuilder};
