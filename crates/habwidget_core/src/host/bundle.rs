//! Bundle resource loaders.
//!
//! # Responsibility
//! - Resolve bundle-relative entry paths to packaged bytes.
//! - Provide the compiled-in provider assets and a filesystem-backed variant.
//!
//! # Invariants
//! - Entry paths are `/`-separated; a leading `/` and `.` segments are ignored.
//! - Paths containing `..` or `\` never resolve to an entry.

use crate::host::BundleResources;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bundle-relative path of the widget definition file.
pub const BUNDLED_WIDGET_FILE: &str = "rollershutter-example.widget.json";

const BUNDLED_ENTRIES: &[(&str, &[u8])] = &[
    (
        BUNDLED_WIDGET_FILE,
        include_bytes!("../../bundle/rollershutter-example.widget.json"),
    ),
    (
        "static/rollershutter.css",
        include_bytes!("../../bundle/static/rollershutter.css"),
    ),
    (
        "icons/rollershutter.svg",
        include_bytes!("../../bundle/icons/rollershutter.svg"),
    ),
    (
        "icons/rollershutter-0.svg",
        include_bytes!("../../bundle/icons/rollershutter-0.svg"),
    ),
    (
        "icons/rollershutter-50.svg",
        include_bytes!("../../bundle/icons/rollershutter-50.svg"),
    ),
    (
        "icons/rollershutter-100.svg",
        include_bytes!("../../bundle/icons/rollershutter-100.svg"),
    ),
];

/// Normalizes one bundle entry path.
///
/// Returns `None` for empty paths and paths that try to escape the bundle.
pub fn normalize_entry_path(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            other if other.contains('\\') => return None,
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// In-memory bundle with a fixed set of entries.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedBundle {
    entries: BTreeMap<String, Arc<[u8]>>,
}

impl EmbeddedBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle holding the widget definition, static files and icons shipped
    /// with this crate.
    pub fn bundled() -> Self {
        let mut bundle = Self::new();
        for (path, bytes) in BUNDLED_ENTRIES {
            bundle.insert(path, bytes.to_vec());
        }
        bundle
    }

    /// Adds or replaces one entry. Invalid paths are ignored.
    pub fn insert(&mut self, path: &str, bytes: impl Into<Vec<u8>>) -> bool {
        let Some(normalized) = normalize_entry_path(path) else {
            return false;
        };
        let bytes: Vec<u8> = bytes.into();
        self.entries.insert(normalized, Arc::from(bytes));
        true
    }

    /// Builder-style variant of [`EmbeddedBundle::insert`].
    pub fn with_entry(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    /// Removes one entry, returning whether it existed.
    pub fn remove(&mut self, path: &str) -> bool {
        normalize_entry_path(path)
            .is_some_and(|normalized| self.entries.remove(&normalized).is_some())
    }

    /// Returns sorted entry paths below `prefix` (all entries for `""`).
    pub fn entry_paths(&self, prefix: &str) -> Vec<String> {
        let prefix = normalize_entry_path(prefix)
            .map(|value| format!("{value}/"))
            .unwrap_or_default();
        self.entries
            .keys()
            .filter(|path| path.starts_with(prefix.as_str()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BundleResources for EmbeddedBundle {
    fn entry_exists(&self, path: &str) -> bool {
        normalize_entry_path(path).is_some_and(|normalized| self.entries.contains_key(&normalized))
    }

    fn open_entry(&self, path: &str) -> std::io::Result<Option<Box<dyn Read + Send>>> {
        let Some(normalized) = normalize_entry_path(path) else {
            return Ok(None);
        };
        Ok(self
            .entries
            .get(&normalized)
            .map(|bytes| Box::new(Cursor::new(Arc::clone(bytes))) as Box<dyn Read + Send>))
    }
}

/// Bundle backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let normalized = normalize_entry_path(path)?;
        Some(
            normalized
                .split('/')
                .fold(self.root.clone(), |acc, segment| acc.join(segment)),
        )
    }
}

impl BundleResources for DirectoryBundle {
    fn entry_exists(&self, path: &str) -> bool {
        self.resolve(path).is_some_and(|resolved| resolved.is_file())
    }

    fn open_entry(&self, path: &str) -> std::io::Result<Option<Box<dyn Read + Send>>> {
        let Some(resolved) = self.resolve(path) else {
            return Ok(None);
        };
        if resolved.is_dir() {
            return Ok(None);
        }
        match File::open(&resolved) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}
