//! Module resolution against a virtual file store.
//!
//! Resolution is a pure function of the specifier, the importer and the
//! store snapshot it is given. Nothing is cached between calls.

use crate::path::{dirname, is_absolute, is_relative, join, normalize};
use crate::store::VirtualFileStore;

/// Extensions appended to a candidate path, in probe order.
pub const PROBE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".json"];

/// Index files tried when a candidate names a directory, in probe order.
pub const INDEX_FILES: &[&str] = &["index.ts", "index.tsx", "index.js", "index.jsx"];

/// Packages that are never bundled: the host UI framework and tooling.
pub const DEFAULT_EXTERNALS: &[&str] = &[
    "typecomposer",
    "typescript",
    "vite",
    "@codesandbox/sandpack-client",
];

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An absolute path that exists in the store.
    Virtual(String),
    /// A bare specifier left for the runtime import map.
    External(String),
}

impl Resolution {
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }
}

/// Resolution failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Could not resolve \"{specifier}\" from \"{importer}\"")]
    Unresolved { specifier: String, importer: String },
}

/// Ordered prefix rewrites (`@/` -> `/src/`). The first matching prefix wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<(String, String)>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an alias. A prefix that is already present keeps its first target.
    pub fn insert(&mut self, prefix: impl Into<String>, target: impl Into<String>) {
        let prefix = prefix.into();
        if prefix.is_empty() || self.entries.iter().any(|(p, _)| *p == prefix) {
            return;
        }
        self.entries.push((prefix, target.into()));
    }

    /// Rewrite `specifier` with the first matching alias.
    pub fn rewrite(&self, specifier: &str) -> Option<String> {
        self.entries.iter().find_map(|(prefix, target)| {
            specifier
                .strip_prefix(prefix.as_str())
                .map(|rest| normalize(&format!("{}/{}", target, rest)))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, t)| (p.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P: Into<String>, T: Into<String>> FromIterator<(P, T)> for AliasTable {
    fn from_iter<I: IntoIterator<Item = (P, T)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (prefix, target) in iter {
            table.insert(prefix, target);
        }
        table
    }
}

/// Maps import specifiers to virtual files or external packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleResolver {
    aliases: AliasTable,
    externals: Vec<String>,
}

impl Default for ModuleResolver {
    fn default() -> Self {
        Self::new(
            AliasTable::from_iter([("@/", "/src/")]),
            DEFAULT_EXTERNALS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl ModuleResolver {
    pub fn new(aliases: AliasTable, externals: Vec<String>) -> Self {
        Self { aliases, externals }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn externals(&self) -> &[String] {
        &self.externals
    }

    /// Add aliases after the existing ones.
    pub fn extend_aliases<'a>(&mut self, extra: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (prefix, target) in extra {
            self.aliases.insert(prefix, target);
        }
    }

    /// Add a package name to the external allow-list.
    pub fn add_external(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.externals.contains(&name) {
            self.externals.push(name);
        }
    }

    /// Whether `specifier` names an allow-listed package or one of its subpaths.
    pub fn is_allow_listed(&self, specifier: &str) -> bool {
        self.externals.iter().any(|name| {
            specifier == name
                || specifier
                    .strip_prefix(name.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Resolve `specifier` imported from `importer` (`None` for the entry point).
    pub fn resolve(
        &self,
        files: &VirtualFileStore,
        specifier: &str,
        importer: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        if self.is_allow_listed(specifier) {
            return Ok(Resolution::External(specifier.to_string()));
        }

        let candidate = if let Some(rewritten) = self.aliases.rewrite(specifier) {
            rewritten
        } else if is_relative(specifier) {
            join(importer.map(dirname).unwrap_or("/"), specifier)
        } else if is_absolute(specifier) {
            normalize(specifier)
        } else {
            return Ok(Resolution::External(specifier.to_string()));
        };

        probe(files, &candidate)
            .map(Resolution::Virtual)
            .ok_or_else(|| ResolveError::Unresolved {
                specifier: specifier.to_string(),
                importer: importer.unwrap_or("<entry>").to_string(),
            })
    }
}

/// Find the first existing file for `candidate`: exact path, then extensions,
/// then directory index files.
pub fn probe(files: &VirtualFileStore, candidate: &str) -> Option<String> {
    if files.has(candidate) {
        return Some(candidate.to_string());
    }

    if let Some(found) = PROBE_EXTENSIONS
        .iter()
        .map(|ext| format!("{}{}", candidate, ext))
        .find(|path| files.has(path))
    {
        return Some(found);
    }

    let dir = candidate.trim_end_matches('/');
    INDEX_FILES
        .iter()
        .map(|index| format!("{}/{}", dir, index))
        .find(|path| files.has(path))
}
