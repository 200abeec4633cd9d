//! The edit-compile-run loop.
//!
//! Edits land in the virtual file store immediately. A compile runs once the
//! editor has been quiet for the debounce period, and at most one compile is
//! in flight at any time: a request made while one is running is dropped, not
//! queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{watch, Mutex};

use playpen_bundler::path::normalize;
use playpen_bundler::{BundleResult, Compile, Language, StoreError, VirtualFileStore};

use crate::host::{PreviewHost, PreviewState};
use crate::surface::{FrameId, PreviewSurface};

/// Prefix of compile errors shown in the error panel.
pub const COMPILE_ERROR_PREFIX: &str = "Compilation Error:";

/// Prefix of preview errors shown in the error panel.
pub const PREVIEW_ERROR_PREFIX: &str = "Preview Error:";

/// Loop timing and entry selection.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Quiet period after the last edit before compiling
    pub debounce: Duration,

    /// Explicit entry file; searched for when absent
    pub entry: Option<String>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            entry: None,
        }
    }
}

/// Which stage produced the message in the error panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelKind {
    Compile,
    Preview,
}

/// Content of the error panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelMessage {
    pub kind: PanelKind,
    pub message: String,
}

/// Result of one [`LiveLoop::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A compile was already in flight; nothing happened.
    Rejected,
    /// The bundle is loaded in a new frame.
    Presented(FrameId),
    CompileFailed(String),
    PreviewFailed(String),
}

/// Snapshot of the loop for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopStatus {
    pub open: String,
    pub compiling: bool,
    /// A settled edit was dropped because a compile was in flight.
    pub stale: bool,
    pub compiles: u64,
    pub preview: PreviewState,
}

/// A file as shown in the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenedFile {
    pub path: String,
    pub code: String,
    pub language: String,
}

/// Errors from editor actions.
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("File not found: {0}")]
    NotFound(String),
}

struct Inner<C, S> {
    files: RwLock<VirtualFileStore>,
    open: RwLock<String>,
    compiler: C,
    host: Mutex<PreviewHost<S>>,
    preview_state: RwLock<PreviewState>,
    config: LiveConfig,
    in_flight: AtomicBool,
    generation: AtomicU64,
    stale: AtomicBool,
    compiles: AtomicU64,
    panel: watch::Sender<Option<PanelMessage>>,
}

/// Wires an editor to the compiler and the preview host.
pub struct LiveLoop<C, S> {
    inner: Arc<Inner<C, S>>,
}

impl<C, S> Clone for LiveLoop<C, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Clears the in-flight flag when a run ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<C, S> LiveLoop<C, S>
where
    C: Compile + 'static,
    S: PreviewSurface + 'static,
{
    pub fn new(
        files: VirtualFileStore,
        open: &str,
        compiler: C,
        host: PreviewHost<S>,
        config: LiveConfig,
    ) -> Self {
        let (panel, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                files: RwLock::new(files),
                open: RwLock::new(normalize(open)),
                compiler,
                preview_state: RwLock::new(host.state()),
                host: Mutex::new(host),
                config,
                in_flight: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                stale: AtomicBool::new(false),
                compiles: AtomicU64::new(0),
                panel,
            }),
        }
    }

    /// Replace the open file's content and schedule a compile.
    pub fn edit(&self, code: impl Into<String>) -> Result<(), LiveError> {
        let path = self.inner.open.read().clone();
        self.edit_file(&path, code)
    }

    /// Replace any file's content and schedule a compile.
    pub fn edit_file(&self, path: &str, code: impl Into<String>) -> Result<(), LiveError> {
        self.inner.files.write().set(path, code)?;
        self.schedule();
        Ok(())
    }

    /// Delete a file and schedule a compile. Returns whether it existed.
    pub fn remove_file(&self, path: &str) -> bool {
        let removed = self.inner.files.write().remove(&normalize(path)).is_some();
        if removed {
            self.schedule();
        }
        removed
    }

    /// Switch the editor to `path`. Does not compile.
    pub fn open(&self, path: &str) -> Result<OpenedFile, LiveError> {
        let path = normalize(path);
        let opened = self.file(&path)?;
        *self.inner.open.write() = path;
        Ok(opened)
    }

    /// The file currently open in the editor.
    pub fn open_file(&self) -> Result<OpenedFile, LiveError> {
        let path = self.inner.open.read().clone();
        self.file(&path)
    }

    pub fn open_path(&self) -> String {
        self.inner.open.read().clone()
    }

    fn file(&self, path: &str) -> Result<OpenedFile, LiveError> {
        let files = self.inner.files.read();
        let code = files
            .get(path)
            .ok_or_else(|| LiveError::NotFound(path.to_string()))?;
        Ok(OpenedFile {
            path: path.to_string(),
            code: code.to_string(),
            language: Language::from_path(path).editor_mode().to_string(),
        })
    }

    /// Current content of `path`.
    pub fn read(&self, path: &str) -> Option<String> {
        self.inner.files.read().get(&normalize(path)).map(str::to_string)
    }

    /// Paths of every file in the project.
    pub fn paths(&self) -> Vec<String> {
        self.inner.files.read().paths().map(str::to_string).collect()
    }

    /// A copy of the current file store.
    pub fn snapshot(&self) -> VirtualFileStore {
        self.inner.files.read().clone()
    }

    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            open: self.open_path(),
            compiling: self.inner.in_flight.load(Ordering::Acquire),
            stale: self.inner.stale.load(Ordering::Acquire),
            compiles: self.inner.compiles.load(Ordering::Acquire),
            preview: *self.inner.preview_state.read(),
        }
    }

    /// Watch the error panel.
    pub fn subscribe_errors(&self) -> watch::Receiver<Option<PanelMessage>> {
        self.inner.panel.subscribe()
    }

    pub fn current_error(&self) -> Option<PanelMessage> {
        self.inner.panel.borrow().clone()
    }

    /// Hide the error panel.
    pub fn dismiss_error(&self) {
        self.inner.panel.send_if_modified(|panel| panel.take().is_some());
    }

    fn show_error(&self, kind: PanelKind, message: String) {
        self.inner
            .panel
            .send_replace(Some(PanelMessage { kind, message }));
    }

    /// Compile after the debounce period unless another edit arrives first.
    fn schedule(&self) {
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.stale.store(false, Ordering::Release);

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.inner.config.debounce).await;
            if this.inner.generation.load(Ordering::Acquire) != generation {
                return;
            }
            if this.run().await == RunOutcome::Rejected {
                this.inner.stale.store(true, Ordering::Release);
                tracing::warn!("Edit arrived during an in-flight compile; preview may be stale");
            }
        });
    }

    /// Compile the current store and present the result.
    ///
    /// Returns [`RunOutcome::Rejected`] without doing anything if a compile
    /// is already in flight.
    pub async fn run(&self) -> RunOutcome {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Compile already in flight; request rejected");
            return RunOutcome::Rejected;
        }
        let _in_flight = InFlight(&self.inner.in_flight);

        self.dismiss_error();
        let snapshot = self.snapshot();
        self.inner.compiles.fetch_add(1, Ordering::AcqRel);

        let result = self
            .inner
            .compiler
            .compile(&snapshot, self.inner.config.entry.as_deref())
            .await;

        let code = match result {
            BundleResult::Success { code } => code,
            BundleResult::Failure { error } => {
                self.show_error(
                    PanelKind::Compile,
                    format!("{}\n{}", COMPILE_ERROR_PREFIX, error),
                );
                return RunOutcome::CompileFailed(error);
            }
        };

        let mut host = self.inner.host.lock().await;
        *self.inner.preview_state.write() = PreviewState::Loading;
        let outcome = match host.present(&code).await {
            Ok(id) => RunOutcome::Presented(id),
            Err(e) => {
                let message = e.to_string();
                tracing::warn!("Preview failed: {}", message);
                self.show_error(
                    PanelKind::Preview,
                    format!("{}\n{}", PREVIEW_ERROR_PREFIX, message),
                );
                RunOutcome::PreviewFailed(message)
            }
        };
        *self.inner.preview_state.write() = host.state();
        outcome
    }

    /// The frame currently shown, waiting for any in-progress load.
    pub async fn current_frame(&self) -> Option<FrameId> {
        self.inner.host.lock().await.current_frame()
    }
}
