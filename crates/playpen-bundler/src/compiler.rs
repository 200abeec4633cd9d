//! Bundler adapter: turns a virtual project into a single ES module.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rolldown::{
    BundlerBuilder, BundlerOptions, InputItem, IsExternal, OutputFormat, Platform,
    RawMinifyOptions, SourceMapType,
};
use rolldown_common::{BundlerTransformOptions, DecoratorOptions, Output};
use rolldown_plugin::__inner::SharedPluginable;
use serde::{Deserialize, Serialize};

use crate::entry::find_entry;
use crate::plugin::VirtualModulePlugin;
use crate::resolver::ModuleResolver;
use crate::store::VirtualFileStore;
use crate::tsconfig::{path_aliases, TSCONFIG_PATH};

/// Outcome of one bundle pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BundleResult {
    Success { code: String },
    Failure { error: String },
}

impl BundleResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Something that can compile a virtual project.
///
/// Implementations never fail past this boundary: every error becomes
/// [`BundleResult::Failure`].
#[async_trait]
pub trait Compile: Send + Sync {
    async fn compile(&self, files: &VirtualFileStore, entry: Option<&str>) -> BundleResult;
}

#[async_trait]
impl<T: Compile + ?Sized> Compile for Arc<T> {
    async fn compile(&self, files: &VirtualFileStore, entry: Option<&str>) -> BundleResult {
        (**self).compile(files, entry).await
    }
}

/// [`Compile`] implementation backed by rolldown.
#[derive(Debug, Clone)]
pub struct RolldownCompiler {
    resolver: ModuleResolver,
    tsconfig_paths: bool,
}

impl Default for RolldownCompiler {
    fn default() -> Self {
        Self::new(ModuleResolver::default())
    }
}

impl RolldownCompiler {
    pub fn new(resolver: ModuleResolver) -> Self {
        Self {
            resolver,
            tsconfig_paths: true,
        }
    }

    /// Whether `compilerOptions.paths` from `/tsconfig.json` add aliases.
    pub fn with_tsconfig_paths(mut self, enabled: bool) -> Self {
        self.tsconfig_paths = enabled;
        self
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// The resolver used for one snapshot, including tsconfig aliases.
    fn resolver_for(&self, files: &VirtualFileStore) -> ModuleResolver {
        let mut resolver = self.resolver.clone();
        if !self.tsconfig_paths {
            return resolver;
        }

        if let Some(source) = files.get(TSCONFIG_PATH) {
            match path_aliases(source) {
                Ok(aliases) => resolver.extend_aliases(
                    aliases
                        .iter()
                        .map(|(prefix, target)| (prefix.as_str(), target.as_str())),
                ),
                Err(e) => tracing::warn!("Ignoring {}: {}", TSCONFIG_PATH, e),
            }
        }
        resolver
    }
}

#[async_trait]
impl Compile for RolldownCompiler {
    async fn compile(&self, files: &VirtualFileStore, entry: Option<&str>) -> BundleResult {
        let entry = match find_entry(files, entry) {
            Ok(entry) => entry,
            Err(message) => return BundleResult::failure(message),
        };

        let snapshot = Arc::new(files.clone());
        let resolver = self.resolver_for(&snapshot);
        tracing::debug!("Compiling {} ({} files)", entry, snapshot.len());

        let task = tokio::spawn(bundle(snapshot, resolver, entry.clone()));
        let result = match task.await {
            Ok(Ok(code)) => BundleResult::Success { code },
            Ok(Err(error)) => BundleResult::Failure { error },
            Err(join_err) => BundleResult::failure(format!("Bundler task failed: {}", join_err)),
        };

        match &result {
            BundleResult::Success { code } => {
                tracing::debug!("Compiled {} ({} bytes)", entry, code.len());
            }
            BundleResult::Failure { error } => {
                tracing::warn!("Compilation of {} failed: {}", entry, error);
            }
        }
        result
    }
}

/// Fixed rolldown options for preview bundles.
fn bundler_options(entry: String, externals: &[String]) -> BundlerOptions {
    BundlerOptions {
        input: Some(vec![InputItem {
            name: None,
            import: entry,
        }]),
        cwd: Some(PathBuf::from("/")),
        format: Some(OutputFormat::Esm),
        platform: Some(Platform::Browser),
        sourcemap: Some(SourceMapType::Inline),
        minify: Some(RawMinifyOptions::from(false)),
        keep_names: Some(true),
        external: Some(IsExternal::from(externals.to_vec())),
        transform: Some(BundlerTransformOptions {
            decorator: Some(DecoratorOptions {
                legacy: Some(true),
                emit_decorator_metadata: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

async fn bundle(
    files: Arc<VirtualFileStore>,
    resolver: ModuleResolver,
    entry: String,
) -> Result<String, String> {
    let options = bundler_options(entry, resolver.externals());
    let plugin = VirtualModulePlugin::new(files, resolver);
    let resolve_errors = plugin.errors();
    let plugins: Vec<SharedPluginable> = vec![Arc::new(plugin)];

    let failure = |diagnostics: &dyn std::fmt::Debug| {
        let recorded = resolve_errors.lock();
        if recorded.is_empty() {
            format!("{:?}", diagnostics)
        } else {
            recorded
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        }
    };

    let mut bundler = BundlerBuilder::default()
        .with_options(options)
        .with_plugins(plugins)
        .build()
        .map_err(|e| failure(&e))?;

    let output = bundler.generate().await.map_err(|e| failure(&e))?;

    output
        .assets
        .iter()
        .find_map(|asset| match asset {
            Output::Chunk(chunk) => Some(chunk.code.to_string()),
            Output::Asset(_) => None,
        })
        .ok_or_else(|| "Compilation produced no output".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_result_serializes_with_status_tag() {
        let json = serde_json::to_string(&BundleResult::failure("boom")).unwrap();
        assert_eq!(json, r#"{"status":"failure","error":"boom"}"#);
    }

    #[test]
    fn tsconfig_paths_extend_configured_aliases() {
        let mut files = VirtualFileStore::new();
        files
            .set(
                TSCONFIG_PATH,
                r#"{ "compilerOptions": { "paths": { "~/*": ["lib/*"] } } }"#,
            )
            .unwrap();

        let compiler = RolldownCompiler::default();
        let resolver = compiler.resolver_for(&files);
        assert_eq!(resolver.aliases().rewrite("~/x"), Some("/lib/x".to_string()));
        assert_eq!(resolver.aliases().rewrite("@/x"), Some("/src/x".to_string()));

        let compiler = RolldownCompiler::default().with_tsconfig_paths(false);
        assert_eq!(compiler.resolver_for(&files).aliases().rewrite("~/x"), None);
    }

    #[test]
    fn malformed_tsconfig_is_ignored() {
        let mut files = VirtualFileStore::new();
        files.set(TSCONFIG_PATH, "{ not json").unwrap();

        let resolver = RolldownCompiler::default().resolver_for(&files);
        assert_eq!(resolver.aliases().len(), 1);
    }

    #[tokio::test]
    async fn missing_entry_is_a_failure() {
        let files = VirtualFileStore::new();

        let result = RolldownCompiler::default().compile(&files, None).await;
        assert_eq!(
            result,
            BundleResult::failure(crate::entry::NO_ENTRY_MESSAGE)
        );
    }
}
