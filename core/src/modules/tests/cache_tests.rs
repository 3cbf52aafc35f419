//! Prototype reuse across loads

use std::sync::Arc;

use super::helpers::{collecting_runtime, module, returning};
use crate::modules::{ModuleLoader, PrototypeCache};

#[test]
fn test_unchanged_source_is_not_recompiled() {
    let cache = PrototypeCache::new();
    let first = cache.get_or_compile("/a.editor_script", "return {}").unwrap();
    let second = cache.get_or_compile("/a.editor_script", "return {}").unwrap();

    assert_eq!(cache.compilations(), 1);
    assert!(Arc::ptr_eq(first.main(), second.main()));
}

#[test]
fn test_changed_source_is_recompiled() {
    let cache = PrototypeCache::new();
    let first = cache.get_or_compile("/a.editor_script", "return {}").unwrap();
    let second = cache.get_or_compile("/a.editor_script", "return { }\n").unwrap();

    assert_eq!(cache.compilations(), 2);
    assert_eq!(cache.len(), 1);
    assert!(!Arc::ptr_eq(first.main(), second.main()));
}

#[test]
fn test_compile_errors_are_not_cached() {
    let cache = PrototypeCache::new();
    assert!(cache.get_or_compile("/bad.editor_script", "return {").is_err());
    assert!(cache.get_or_compile("/bad.editor_script", "return {").is_err());
    assert!(cache.is_empty());
    assert_eq!(cache.compilations(), 0);
}

#[test]
fn test_loader_reuses_prototypes_and_forgets_removed_paths() {
    let loader = ModuleLoader::new();
    let sources = vec![
        returning("/a.editor_script", "get_commands", "1"),
        returning("/b.editor_script", "get_commands", "2"),
    ];

    let (runtime, _display) = collecting_runtime();
    loader.load_all(&runtime, &sources);
    let (runtime, _display) = collecting_runtime();
    loader.load_all(&runtime, &sources);
    assert_eq!(loader.cache().compilations(), 2);

    let (runtime, _display) = collecting_runtime();
    let aggregate = loader.load_all(
        &runtime,
        &[
            returning("/a.editor_script", "get_commands", "1"),
            module("/c.editor_script", "return {}"),
        ],
    );
    assert_eq!(loader.cache().compilations(), 3);
    assert_eq!(loader.cache().len(), 2);
    assert_eq!(aggregate.modules().len(), 2);
}
