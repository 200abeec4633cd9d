//! `playpen.toml` loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use playpen_bundler::{AliasTable, ModuleResolver, RolldownCompiler, DEFAULT_EXTERNALS};
use playpen_preview::host::PreviewConfig;
use playpen_preview::{ImportMap, LiveConfig};

/// Configuration file structure (playpen.toml).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub resolve: ResolveConfig,
    pub preview: PreviewSettings,
    pub live: LiveSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project directory
    pub dir: PathBuf,
    /// Explicit entry file
    pub entry: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("playground"),
            entry: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Import prefix to virtual prefix
    pub aliases: BTreeMap<String, String>,
    /// Packages left for the browser to load
    pub externals: Vec<String>,
    /// Read extra aliases from `compilerOptions.paths`
    pub tsconfig_paths: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            aliases: BTreeMap::from([("@/".to_string(), "/src/".to_string())]),
            externals: DEFAULT_EXTERNALS.iter().map(|s| s.to_string()).collect(),
            tsconfig_paths: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    pub title: String,
    pub load_timeout_ms: u64,
    /// Base URL for packages `imports` does not name
    pub cdn_fallback: Option<String>,
    /// Runtime import map
    pub imports: BTreeMap<String, String>,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            title: playpen_preview::document::DEFAULT_TITLE.to_string(),
            load_timeout_ms: 500,
            cdn_fallback: None,
            imports: ImportMap::with_framework().imports,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
    pub debounce_ms: u64,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

impl Config {
    /// Load configuration from `path` if it exists.
    /// Returns an error if the file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("{} not found; using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn import_map(&self) -> ImportMap {
        let mut imports = ImportMap::new();
        for (specifier, url) in &self.preview.imports {
            imports.insert(specifier.as_str(), url.as_str());
        }
        imports
    }

    /// Resolver with the configured aliases. Import map keys join the
    /// externals so the browser resolves them.
    pub fn resolver(&self) -> ModuleResolver {
        // Longest prefix first, so `@/lib/` beats `@/`
        let mut aliases: Vec<_> = self.resolve.aliases.iter().collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        let aliases: AliasTable = aliases.into_iter().collect();

        let mut resolver = ModuleResolver::new(aliases, self.resolve.externals.clone());
        let imports = self.import_map();
        for package in imports.packages() {
            if !resolver.is_allow_listed(package) {
                resolver.add_external(package);
            }
        }
        resolver
    }

    pub fn compiler(&self) -> RolldownCompiler {
        RolldownCompiler::new(self.resolver()).with_tsconfig_paths(self.resolve.tsconfig_paths)
    }

    pub fn preview_config(&self) -> PreviewConfig {
        PreviewConfig {
            title: self.preview.title.clone(),
            load_timeout: Duration::from_millis(self.preview.load_timeout_ms),
            imports: self.import_map(),
            cdn_fallback: self.preview.cdn_fallback.clone(),
        }
    }

    pub fn live_config(&self) -> LiveConfig {
        LiveConfig {
            debounce: Duration::from_millis(self.live.debounce_ms),
            entry: self.project.entry.clone(),
        }
    }
}

/// Written by `playpen init`.
pub const DEFAULT_CONFIG: &str = r#"# Playpen Configuration

[project]
# Directory holding the playground project
dir = "playground"

# Entry file; searched for when omitted
# entry = "/src/main.ts"

[resolve]
# Packages the browser loads through the import map
externals = ["typecomposer", "typescript", "vite", "@codesandbox/sandpack-client"]

# Read extra aliases from compilerOptions.paths in /tsconfig.json
tsconfig_paths = true

[resolve.aliases]
"@/" = "/src/"

[preview]
title = "TypeComposer Preview"

# How long to wait for a preview frame to load
load_timeout_ms = 500

# Base URL for packages missing from [preview.imports]
# cdn_fallback = "https://esm.sh"

[preview.imports]
typecomposer = "https://esm.sh/typecomposer@0.1.53"
"typecomposer/" = "https://esm.sh/typecomposer@0.1.53/"

[live]
# Quiet period after the last keystroke before compiling
debounce_ms = 300
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let temp = tempdir().unwrap();
        let config = Config::load(&temp.path().join("playpen.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.project.dir, PathBuf::from("playground"));
        assert_eq!(config.live.debounce_ms, 300);
    }

    #[test]
    fn default_config_file_matches_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[project]
entry = "/src/app.ts"

[live]
debounce_ms = 50
"#,
        )
        .unwrap();

        assert_eq!(config.project.dir, PathBuf::from("playground"));
        assert_eq!(config.project.entry.as_deref(), Some("/src/app.ts"));
        assert_eq!(config.live_config().debounce, Duration::from_millis(50));
        assert_eq!(config.preview.load_timeout_ms, 500);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("playpen.toml");
        fs::write(&path, "[live\ndebounce_ms = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn import_map_keys_become_externals() {
        let config: Config = toml::from_str(
            r#"
[preview.imports]
typecomposer = "https://esm.sh/typecomposer@0.1.53"
nanoid = "https://esm.sh/nanoid@5"
"#,
        )
        .unwrap();

        let resolver = config.resolver();
        assert!(resolver.is_allow_listed("nanoid"));
        assert_eq!(
            resolver
                .externals()
                .iter()
                .filter(|e| e.as_str() == "typecomposer")
                .count(),
            1
        );
        assert!(config.import_map().covers("nanoid"));
    }

    #[test]
    fn default_import_map_covers_framework_subpaths() {
        let config = Config::default();

        assert!(config.import_map().covers("typecomposer/elements"));
        assert!(config.resolver().is_allow_listed("typecomposer/elements"));
        assert_eq!(
            config
                .resolver()
                .externals()
                .iter()
                .filter(|e| e.starts_with("typecomposer"))
                .count(),
            1
        );
    }

    #[test]
    fn longer_alias_prefixes_win() {
        let config: Config = toml::from_str(
            r#"
[resolve.aliases]
"@/" = "/src/"
"@/lib/" = "/vendor/"
"#,
        )
        .unwrap();

        let resolver = config.resolver();
        assert_eq!(
            resolver.aliases().rewrite("@/lib/x"),
            Some("/vendor/x".to_string())
        );
        assert_eq!(resolver.aliases().rewrite("@/x"), Some("/src/x".to_string()));
    }
}
