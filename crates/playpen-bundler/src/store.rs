//! In-memory virtual file store.
//!
//! Maps absolute virtual paths (`/src/main.ts`) to source text. The store is
//! a flat mapping; directories only exist as shared path prefixes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::path::normalize;

/// Longest accepted virtual path, in bytes.
pub const MAX_PATH_LEN: usize = 4096;

/// Largest accepted file content, in bytes.
pub const MAX_FILE_SIZE: usize = 1024 * 1024;

/// Directories never loaded from disk.
const SKIPPED_DIRS: &[&str] = &["node_modules", "dist", "target"];

/// A miniature project held entirely in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualFileStore {
    files: BTreeMap<String, String>,
}

impl VirtualFileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Source text stored at `path`, if any.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(&normalize(path)).map(String::as_str)
    }

    /// Whether a file exists at `path`.
    pub fn has(&self, path: &str) -> bool {
        self.files.contains_key(&normalize(path))
    }

    /// Insert or replace the file at `path`.
    ///
    /// The path is normalised before insertion; the previous content (if any)
    /// is replaced as a whole.
    pub fn set(&mut self, path: &str, code: impl Into<String>) -> Result<(), StoreError> {
        let code = code.into();
        let path = validate_path(path)?;

        if code.len() > MAX_FILE_SIZE {
            return Err(StoreError::FileTooLarge {
                path,
                size: code.len(),
            });
        }

        self.files.insert(path, code);
        Ok(())
    }

    /// Remove the file at `path`, returning its content.
    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.files.remove(&normalize(path))
    }

    /// All paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Iterate `(path, code)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Load every file under `dir` into a new store.
    ///
    /// Hidden entries and build/dependency directories are skipped, as are
    /// files that are not UTF-8 or exceed [`MAX_FILE_SIZE`].
    pub fn from_dir(dir: &Path) -> Result<Self, StoreError> {
        if !dir.is_dir() {
            return Err(StoreError::DirectoryNotFound(dir.display().to_string()));
        }

        let mut store = Self::new();

        let walker = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped(e.file_name().to_str()));

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(virtual_path) = virtual_path_for(dir, entry.path()) else {
                continue;
            };

            let code = match fs::read_to_string(entry.path()) {
                Ok(code) => code,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            if let Err(e) = store.set(&virtual_path, code) {
                tracing::warn!("Skipping {}: {}", entry.path().display(), e);
            }
        }

        tracing::debug!("Loaded {} files from {}", store.len(), dir.display());
        Ok(store)
    }

    /// Write every file in the store below `dir`, creating directories as needed.
    pub fn write_to_dir(&self, dir: &Path) -> Result<(), StoreError> {
        for (path, code) in self.iter() {
            let target = dir.join(path.trim_start_matches('/'));
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Io(target.display().to_string(), e))?;
            }
            fs::write(&target, code).map_err(|e| StoreError::Io(target.display().to_string(), e))?;
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for VirtualFileStore {
    /// Collect pairs without validation. Intended for fixtures.
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            files: iter
                .into_iter()
                .map(|(path, code)| (normalize(&path), code))
                .collect(),
        }
    }
}

/// Map a host path below `root` to a `/`-separated virtual path.
pub fn virtual_path_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut out = String::new();
    for component in relative.components() {
        out.push('/');
        out.push_str(component.as_os_str().to_str()?);
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Whether a virtual path lies inside a hidden entry or a directory that
/// [`VirtualFileStore::from_dir`] skips.
pub fn is_ignored(virtual_path: &str) -> bool {
    virtual_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .any(|segment| is_skipped(Some(segment)))
}

fn is_skipped(name: Option<&str>) -> bool {
    match name {
        Some(name) => name.starts_with('.') || SKIPPED_DIRS.contains(&name),
        None => true,
    }
}

fn validate_path(path: &str) -> Result<String, StoreError> {
    if !path.starts_with('/') {
        return Err(StoreError::InvalidPath(format!(
            "{}: virtual paths must start with '/'",
            path
        )));
    }
    if path.contains('\0') {
        return Err(StoreError::InvalidPath(
            "path contains a null byte".to_string(),
        ));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(StoreError::InvalidPath(format!(
            "path is longer than {} bytes",
            MAX_PATH_LEN
        )));
    }

    let normalized = normalize(path);
    if normalized == "/" {
        return Err(StoreError::InvalidPath(format!("{}: not a file path", path)));
    }
    Ok(normalized)
}

/// Errors raised by the virtual file store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid virtual path: {0}")]
    InvalidPath(String),

    #[error("File too large: {path} ({size} bytes, max {max})", max = MAX_FILE_SIZE)]
    FileTooLarge { path: String, size: usize },

    #[error("Project directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to write {0}: {1}")]
    Io(String, #[source] std::io::Error),
}
