//! Script module sources

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Source text of one module and the path it is known by
///
/// Paths are rooted at the project directory: `/hooks.editor_script`,
/// `/tools/format.editor_script`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    pub path: String,
    pub source: String,
}

impl ModuleSource {
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Every file under `root` with `extension`, sorted by path
    pub fn discover(root: &Path, extension: &str) -> Result<Vec<ModuleSource>> {
        let mut sources = Vec::new();
        collect(root, root, extension, &mut sources)?;
        sources.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(sources)
    }
}

fn collect(root: &Path, dir: &Path, extension: &str, out: &mut Vec<ModuleSource>) -> Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect(root, &path, extension, out)?;
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let source = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        out.push(ModuleSource::new(module_path(root, &path), source));
    }
    Ok(())
}

/// `/`-separated path relative to `root`, with a leading `/`
fn module_path(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let segments: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/{}", segments.join("/"))
}
