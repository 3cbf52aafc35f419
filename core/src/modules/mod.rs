//! Script module loader and registry
//!
//! A module is a script whose top-level body returns an object mapping
//! hook names to functions:
//!
//! ```text
//! return {
//!     get_commands: function() { return [{ label: "Format", run: format }] },
//!     on_build_started: function(target) { return [] },
//! }
//! ```
//!
//! Loading compiles every module (in parallel), then binds and runs each
//! body in order in an immediate context. A module that fails at any step,
//! or returns something other than such an object, is reported through the
//! runtime's display output and left out. The others still load.
//!
//! The module at the hooks path (`/hooks.editor_script` by default) also
//! provides the lifecycle hooks run by `run_lifecycle_hook`.

mod aggregate;
mod cache;
mod hook;
mod lifecycle;
mod loader;
mod source;

#[cfg(test)]
mod tests;

pub use aggregate::{call_all, HookEntry, HookResults, ModuleAggregate};
pub use cache::PrototypeCache;
pub use hook::HookName;
pub use lifecycle::run_lifecycle_hook;
pub use loader::{load_all, reload, ModuleLoader};
pub use source::ModuleSource;

/// Reserved path of the lifecycle hooks module
pub const HOOKS_PATH: &str = "/hooks.editor_script";
