//! Preview side of the playpen playground.
//!
//! Wraps compiled bundles in standalone documents, loads them into isolated
//! frames and drives the debounced edit-compile-run loop.

pub mod document;
pub mod host;
pub mod import_map;
pub mod live;
pub mod scan;
pub mod surface;

pub use document::{DocumentError, DocumentRenderer, PreviewDocument};
pub use host::{PreviewConfig, PreviewError, PreviewHost, PreviewState};
pub use import_map::ImportMap;
pub use live::{
    LiveConfig, LiveError, LiveLoop, LoopStatus, OpenedFile, PanelKind, PanelMessage, RunOutcome,
};
pub use scan::scan_bare_imports;
pub use surface::{
    FrameId, LoadBehaviour, MemorySurface, MountedFrame, PreviewSurface, SurfaceError,
};
