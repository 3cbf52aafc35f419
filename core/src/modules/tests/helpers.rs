//! Test helpers for module loading

use std::sync::Arc;

use crate::host::{CollectingDisplay, Runtime, RuntimeBuilder};
use crate::modules::ModuleSource;

pub fn module(path: &str, source: &str) -> ModuleSource {
    ModuleSource::new(path, source)
}

/// Module registering `hook` as a function returning `value`
pub fn returning(path: &str, hook: &str, value: &str) -> ModuleSource {
    module(
        path,
        &format!("return {{ {}: function() {{ return {} }} }}", hook, value),
    )
}

pub fn collecting_builder() -> (RuntimeBuilder, Arc<CollectingDisplay>) {
    let display = Arc::new(CollectingDisplay::new());
    (Runtime::builder().display(display.clone()), display)
}

pub fn collecting_runtime() -> (Runtime, Arc<CollectingDisplay>) {
    let (builder, display) = collecting_builder();
    (builder.build().expect("runtime build failed"), display)
}
