//! Preview host: turns bundles into loaded, isolated frames.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::document::{DocumentError, DocumentRenderer, DEFAULT_TITLE};
use crate::import_map::ImportMap;
use crate::scan::scan_bare_imports;
use crate::surface::{FrameId, PreviewSurface, SurfaceError};

/// Lifecycle of the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Configuration for preview documents and frame loading.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// Document title
    pub title: String,

    /// How long to wait for a frame's load signal before assuming success
    pub load_timeout: Duration,

    /// Runtime import map for external packages
    pub imports: ImportMap,

    /// Base URL for packages the import map does not name
    pub cdn_fallback: Option<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            load_timeout: Duration::from_millis(500),
            imports: ImportMap::with_framework(),
            cdn_fallback: None,
        }
    }
}

/// Errors presenting a bundle.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Owns the current preview frame on a surface.
///
/// Each successful [`present`](Self::present) replaces the frame wholesale;
/// the previous frame is released once the new one has loaded or its load
/// timeout has elapsed.
pub struct PreviewHost<S> {
    surface: Arc<S>,
    renderer: DocumentRenderer,
    config: PreviewConfig,
    state: PreviewState,
    current: Option<FrameId>,
}

impl<S: PreviewSurface> PreviewHost<S> {
    pub fn new(surface: Arc<S>, config: PreviewConfig) -> Self {
        Self {
            surface,
            renderer: DocumentRenderer::new(),
            config,
            state: PreviewState::Idle,
            current: None,
        }
    }

    pub fn state(&self) -> PreviewState {
        self.state
    }

    pub fn current_frame(&self) -> Option<FrameId> {
        self.current
    }

    pub fn surface(&self) -> &Arc<S> {
        &self.surface
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Import map for `code`: the configured map plus CDN fallbacks for any
    /// other bare import the bundle still contains.
    pub fn import_map_for(&self, code: &str) -> ImportMap {
        let mut imports = self.config.imports.clone();
        let scanned = scan_bare_imports(code);
        let unmapped = imports.fill_missing(
            scanned.iter().map(String::as_str),
            self.config.cdn_fallback.as_deref(),
        );
        for specifier in unmapped {
            tracing::warn!(
                "No import map entry for \"{}\"; it will fail to load in the preview",
                specifier
            );
        }
        imports
    }

    /// Load `code` into a fresh frame and make it the current preview.
    pub async fn present(&mut self, code: &str) -> Result<FrameId, PreviewError> {
        self.state = PreviewState::Loading;

        let imports = self.import_map_for(code);
        let document = match self.renderer.render(code, &imports, &self.config.title) {
            Ok(document) => document,
            Err(e) => {
                self.state = PreviewState::Failed;
                return Err(e.into());
            }
        };

        let frame = match self.surface.mount(&document) {
            Ok(frame) => frame,
            Err(e) => {
                self.state = PreviewState::Failed;
                return Err(e.into());
            }
        };

        match tokio::time::timeout(self.config.load_timeout, frame.loaded).await {
            Ok(Ok(())) => tracing::debug!("Preview frame {} loaded", frame.id),
            Ok(Err(_)) => tracing::debug!("Preview frame {} closed its load signal", frame.id),
            Err(_) => tracing::warn!(
                "Preview frame {} did not report load within {:?}; assuming it loaded",
                frame.id,
                self.config.load_timeout
            ),
        }

        if let Some(previous) = self.current.replace(frame.id) {
            self.surface.release(previous);
            tracing::debug!("Released preview frame {}", previous);
        }

        self.state = PreviewState::Ready;
        Ok(frame.id)
    }

    /// Release the current frame, returning to `Idle`.
    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            self.surface.release(previous);
        }
        self.state = PreviewState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{LoadBehaviour, MemorySurface};

    fn host(behaviour: LoadBehaviour) -> PreviewHost<MemorySurface> {
        PreviewHost::new(
            Arc::new(MemorySurface::with_behaviour(behaviour)),
            PreviewConfig::default(),
        )
    }

    #[tokio::test]
    async fn present_moves_to_ready() {
        let mut host = host(LoadBehaviour::Immediate);
        assert_eq!(host.state(), PreviewState::Idle);

        let id = host.present("console.log('ready');").await.unwrap();

        assert_eq!(host.state(), PreviewState::Ready);
        assert_eq!(host.current_frame(), Some(id));
        let document = host.surface().document(id).unwrap();
        assert!(document.html.contains("console.log('ready');"));
    }

    #[tokio::test]
    async fn keeps_one_live_frame_across_runs() {
        let mut host = host(LoadBehaviour::Immediate);

        let first = host.present("1;").await.unwrap();
        let second = host.present("2;").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(host.surface().live_frames(), 1);
        assert_eq!(host.surface().mount_count(), 2);
        assert!(host.surface().document(first).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn load_timeout_counts_as_success() {
        let mut host = host(LoadBehaviour::Never);

        let started = tokio::time::Instant::now();
        let id = host.present("1;").await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(host.state(), PreviewState::Ready);
        assert_eq!(host.current_frame(), Some(id));
    }

    #[tokio::test]
    async fn mount_failure_keeps_previous_frame() {
        let mut host = host(LoadBehaviour::Immediate);
        let first = host.present("1;").await.unwrap();

        host.surface().set_behaviour(LoadBehaviour::Fail);
        let result = host.present("2;").await;

        assert!(matches!(result, Err(PreviewError::Surface(_))));
        assert_eq!(host.state(), PreviewState::Failed);
        assert_eq!(host.current_frame(), Some(first));
        assert_eq!(host.surface().live_frames(), 1);

        host.surface().set_behaviour(LoadBehaviour::Immediate);
        host.present("3;").await.unwrap();
        assert_eq!(host.state(), PreviewState::Ready);
    }

    #[tokio::test]
    async fn import_map_uses_cdn_fallback_for_unknown_packages() {
        let config = PreviewConfig {
            cdn_fallback: Some("https://esm.sh".to_string()),
            ..Default::default()
        };
        let host = PreviewHost::new(Arc::new(MemorySurface::new()), config);

        let imports = host.import_map_for("import { nanoid } from \"nanoid\";\nnanoid();\n");

        assert!(imports.covers("typecomposer"));
        assert_eq!(
            imports.imports.get("nanoid").map(String::as_str),
            Some("https://esm.sh/nanoid")
        );
    }

    #[tokio::test]
    async fn clear_releases_current_frame() {
        let mut host = host(LoadBehaviour::Immediate);
        host.present("1;").await.unwrap();

        host.clear();

        assert_eq!(host.state(), PreviewState::Idle);
        assert_eq!(host.surface().live_frames(), 0);
    }
}
