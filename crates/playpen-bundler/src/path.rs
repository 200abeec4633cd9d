//! Virtual path helpers.
//!
//! Virtual paths are plain `/`-separated strings rooted at `/`. They never
//! touch the host filesystem and use `/` on every platform.

use std::path::{Component, Path};

use path_clean::PathClean;

/// Collapse `.` and `..` segments and duplicate slashes into an absolute path.
///
/// `..` at the root stays at the root.
pub fn normalize(path: &str) -> String {
    let cleaned = Path::new("/").join(path).clean();
    let segments: Vec<_> = cleaned
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect();

    format!("/{}", segments.join("/"))
}

/// Directory portion of a virtual file path (`/src/main.ts` -> `/src`).
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Resolve `relative` against the directory `base_dir`.
pub fn join(base_dir: &str, relative: &str) -> String {
    normalize(&format!("{}/{}", base_dir, relative))
}

/// Whether a specifier is relative (`./x`, `../x`, `.`, `..`).
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with('.')
}

/// Whether a specifier is an absolute virtual path.
pub fn is_absolute(specifier: &str) -> bool {
    specifier.starts_with('/')
}
