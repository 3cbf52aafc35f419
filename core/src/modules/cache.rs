//! Compiled prototypes shared across reloads

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::executor::{compile, CompileError, Prototype};

/// Prototypes keyed by path and source hash
///
/// A path whose source is unchanged since it was last compiled is not
/// compiled again. Failed compilations are not cached.
#[derive(Default)]
pub struct PrototypeCache {
    entries: Mutex<HashMap<String, (String, Prototype)>>,
    compiled: AtomicUsize,
}

impl PrototypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached prototype for `path`, compiling when missing or stale
    ///
    /// Compilation happens outside the cache lock.
    pub fn get_or_compile(&self, path: &str, source: &str) -> Result<Prototype, CompileError> {
        let version = hash_source(source);
        if let Some((cached_version, prototype)) = self.entries.lock().get(path) {
            if *cached_version == version {
                return Ok(prototype.clone());
            }
        }

        let prototype = compile(path, source)?;
        self.compiled.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .insert(path.to_string(), (version, prototype.clone()));
        Ok(prototype)
    }

    /// Number of compilations performed through this cache
    pub fn compilations(&self) -> usize {
        self.compiled.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop paths no longer present in a source set
    pub fn retain_paths<'a>(&self, paths: impl IntoIterator<Item = &'a str>) {
        let keep: std::collections::HashSet<&str> = paths.into_iter().collect();
        self.entries.lock().retain(|path, _| keep.contains(path.as_str()));
    }
}

/// Hash source using SHA256
fn hash_source(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}
