//! Runtime import map for preview documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Package name of the host UI framework.
pub const FRAMEWORK_PACKAGE: &str = "typecomposer";

/// Distribution URL the framework resolves to inside previews.
pub const FRAMEWORK_URL: &str = "https://esm.sh/typecomposer@0.1.53";

/// A browser import map (`{"imports": {...}}`).
///
/// Keys ending in `/` map every specifier with that prefix, as in browsers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
    pub imports: BTreeMap<String, String>,
}

impl ImportMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default map: the framework and its subpaths on its pinned CDN build.
    pub fn with_framework() -> Self {
        let mut map = Self::new();
        map.insert(FRAMEWORK_PACKAGE, FRAMEWORK_URL);
        map.insert(format!("{}/", FRAMEWORK_PACKAGE), format!("{}/", FRAMEWORK_URL));
        map
    }

    pub fn insert(&mut self, specifier: impl Into<String>, url: impl Into<String>) {
        self.imports.insert(specifier.into(), url.into());
    }

    /// Package names declared by this map, usable as bundler externals.
    ///
    /// A prefix key (`lit/`) is folded into its bare key (`lit`) when both exist.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.imports.keys().filter_map(|key| {
            let package = key.trim_end_matches('/');
            let folded = package.len() != key.len() && self.imports.contains_key(package);
            (!package.is_empty() && !folded).then_some(package)
        })
    }

    /// Whether the browser would resolve `specifier` through this map.
    pub fn covers(&self, specifier: &str) -> bool {
        self.imports.keys().any(|key| {
            if key.ends_with('/') {
                specifier.starts_with(key.as_str())
            } else {
                specifier == key
            }
        })
    }

    /// Map each of `specifiers` the map does not already cover.
    ///
    /// With a CDN fallback, missing specifiers become `{fallback}/{specifier}`.
    /// Returns the specifiers that are still unmapped.
    pub fn fill_missing<'a>(
        &mut self,
        specifiers: impl IntoIterator<Item = &'a str>,
        cdn_fallback: Option<&str>,
    ) -> Vec<String> {
        let mut unmapped = Vec::new();

        for specifier in specifiers {
            if self.covers(specifier) {
                continue;
            }
            match cdn_fallback {
                Some(base) => {
                    let url = format!("{}/{}", base.trim_end_matches('/'), specifier);
                    tracing::debug!("Mapping {} to {}", specifier, url);
                    self.insert(specifier, url);
                }
                None => unmapped.push(specifier.to_string()),
            }
        }

        unmapped
    }

    /// JSON text for a `<script type="importmap">` element.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{\"imports\":{}}".to_string())
    }
}
