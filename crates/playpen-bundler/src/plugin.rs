//! Rolldown plugin serving modules from a virtual file store.

use std::borrow::Cow;
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use rolldown_common::{ModuleType, ResolvedExternal};
use rolldown_plugin::{
    HookLoadArgs, HookLoadOutput, HookLoadReturn, HookResolveIdArgs, HookResolveIdOutput,
    HookResolveIdReturn, HookUsage, Plugin, PluginContext,
};

use crate::language::Language;
use crate::resolver::{ModuleResolver, Resolution, ResolveError};
use crate::store::VirtualFileStore;

/// Resolves imports with [`ModuleResolver`] and loads file contents from a
/// store snapshot taken when the compile started.
#[derive(Debug)]
pub struct VirtualModulePlugin {
    files: Arc<VirtualFileStore>,
    resolver: Arc<ModuleResolver>,
    errors: Arc<Mutex<Vec<ResolveError>>>,
}

impl VirtualModulePlugin {
    pub fn new(files: Arc<VirtualFileStore>, resolver: ModuleResolver) -> Self {
        Self {
            files,
            resolver: Arc::new(resolver),
            errors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the resolution failures recorded during the build.
    pub fn errors(&self) -> Arc<Mutex<Vec<ResolveError>>> {
        Arc::clone(&self.errors)
    }
}

impl Plugin for VirtualModulePlugin {
    fn name(&self) -> Cow<'static, str> {
        "playpen-virtual-modules".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId | HookUsage::Load
    }

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs<'_>,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let specifier = args.specifier.to_string();
        let importer = args.importer.map(|s| s.to_string());
        let files = Arc::clone(&self.files);
        let resolver = Arc::clone(&self.resolver);
        let errors = Arc::clone(&self.errors);

        async move {
            // Rolldown's own internal modules
            if specifier.starts_with('\0') || specifier.starts_with("rolldown:") {
                return Ok(None);
            }

            match resolver.resolve(&files, &specifier, importer.as_deref()) {
                Ok(Resolution::Virtual(path)) => Ok(Some(HookResolveIdOutput {
                    id: path.into(),
                    external: Some(ResolvedExternal::Bool(false)),
                    ..Default::default()
                })),
                Ok(Resolution::External(name)) => Ok(Some(HookResolveIdOutput {
                    id: name.into(),
                    external: Some(ResolvedExternal::Bool(true)),
                    ..Default::default()
                })),
                Err(err) => {
                    let message = err.to_string();
                    errors.lock().push(err);
                    Err(anyhow!(message))
                }
            }
        }
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let id = args.id.to_string();
        let files = Arc::clone(&self.files);

        async move {
            let Some(source) = files.get(&id) else {
                return Ok(None);
            };

            let (code, module_type) = module_source(&id, source);
            Ok(Some(HookLoadOutput {
                code: code.into(),
                module_type: Some(module_type),
                ..Default::default()
            }))
        }
    }
}

/// Code and rolldown module type for a virtual file.
fn module_source(id: &str, source: &str) -> (String, ModuleType) {
    match Language::from_path(id) {
        Language::TypeScript => (source.to_string(), ModuleType::Ts),
        Language::Tsx => (source.to_string(), ModuleType::Tsx),
        Language::Jsx => (source.to_string(), ModuleType::Jsx),
        Language::Json => (source.to_string(), ModuleType::Json),
        Language::Css => (css_module(source), ModuleType::Js),
        Language::JavaScript | Language::Html | Language::Unknown => {
            (source.to_string(), ModuleType::Js)
        }
    }
}

/// A JS module that injects `css` into the document head.
fn css_module(css: &str) -> String {
    let literal = serde_json::to_string(css).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "const css = {literal};\n\
         const style = document.createElement(\"style\");\n\
         style.textContent = css;\n\
         document.head.appendChild(style);\n\
         export default css;\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_module_types_from_language() {
        assert!(matches!(module_source("/a.ts", "").1, ModuleType::Ts));
        assert!(matches!(module_source("/a.tsx", "").1, ModuleType::Tsx));
        assert!(matches!(module_source("/a.jsx", "").1, ModuleType::Jsx));
        assert!(matches!(module_source("/a.json", "{}").1, ModuleType::Json));
        assert!(matches!(module_source("/a.mjs", "").1, ModuleType::Js));
    }

    #[test]
    fn css_becomes_style_injecting_module() {
        let (code, module_type) = module_source("/src/app.css", "body { color: \"red\"; }");

        assert!(matches!(module_type, ModuleType::Js));
        assert!(code.contains(r#"const css = "body { color: \"red\"; }";"#));
        assert!(code.contains("document.head.appendChild(style)"));
    }
}
