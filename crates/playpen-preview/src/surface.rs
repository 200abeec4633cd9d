//! Isolated execution surfaces that preview documents are loaded into.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::document::PreviewDocument;

/// Identity of one mounted frame. Random, so frame URLs are unguessable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(Uuid);

impl FrameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for FrameId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A frame that has been handed its document.
///
/// `loaded` resolves when the frame reports load completion. It may never
/// resolve; callers bound the wait with a timeout.
#[derive(Debug)]
pub struct MountedFrame {
    pub id: FrameId,
    pub loaded: oneshot::Receiver<()>,
}

/// Errors from a preview surface.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Failed to mount preview frame: {0}")]
    MountFailed(String),
}

/// A place that can run preview documents in isolation from the host.
pub trait PreviewSurface: Send + Sync {
    /// Load `document` into a fresh frame.
    fn mount(&self, document: &PreviewDocument) -> Result<MountedFrame, SurfaceError>;

    /// Dispose of a frame and everything it holds. Unknown ids are ignored.
    fn release(&self, id: FrameId);

    /// Number of frames currently mounted.
    fn live_frames(&self) -> usize;
}

/// How a [`MemorySurface`] reacts to a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBehaviour {
    /// Report load completion right away.
    #[default]
    Immediate,
    /// Never report load completion (until [`MemorySurface::fire_load`]).
    Never,
    /// Refuse to mount.
    Fail,
}

#[derive(Debug, Default)]
struct MemoryState {
    frames: BTreeMap<FrameId, PreviewDocument>,
    pending: HashMap<FrameId, oneshot::Sender<()>>,
    behaviour: LoadBehaviour,
    mounts: usize,
}

/// In-process surface that keeps mounted documents in memory.
#[derive(Debug, Default)]
pub struct MemorySurface {
    state: Mutex<MemoryState>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behaviour(behaviour: LoadBehaviour) -> Self {
        let surface = Self::new();
        surface.set_behaviour(behaviour);
        surface
    }

    pub fn set_behaviour(&self, behaviour: LoadBehaviour) {
        self.state.lock().behaviour = behaviour;
    }

    /// Document held by a live frame.
    pub fn document(&self, id: FrameId) -> Option<PreviewDocument> {
        self.state.lock().frames.get(&id).cloned()
    }

    /// Total successful mounts over the surface's lifetime.
    pub fn mount_count(&self) -> usize {
        self.state.lock().mounts
    }

    /// Report load completion for a frame mounted with [`LoadBehaviour::Never`].
    pub fn fire_load(&self, id: FrameId) -> bool {
        match self.state.lock().pending.remove(&id) {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

impl PreviewSurface for MemorySurface {
    fn mount(&self, document: &PreviewDocument) -> Result<MountedFrame, SurfaceError> {
        let mut state = self.state.lock();

        if state.behaviour == LoadBehaviour::Fail {
            return Err(SurfaceError::MountFailed(
                "surface refused the document".to_string(),
            ));
        }

        let id = FrameId::new();
        let (tx, rx) = oneshot::channel();
        state.frames.insert(id, document.clone());
        state.mounts += 1;

        match state.behaviour {
            LoadBehaviour::Immediate => {
                let _ = tx.send(());
            }
            _ => {
                state.pending.insert(id, tx);
            }
        }

        Ok(MountedFrame { id, loaded: rx })
    }

    fn release(&self, id: FrameId) {
        let mut state = self.state.lock();
        state.frames.remove(&id);
        state.pending.remove(&id);
    }

    fn live_frames(&self) -> usize {
        self.state.lock().frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> PreviewDocument {
        PreviewDocument {
            html: "<!DOCTYPE html>".to_string(),
        }
    }

    #[test]
    fn frame_ids_round_trip_through_strings() {
        let id = FrameId::new();
        let parsed: FrameId = id.to_string().parse().unwrap();

        assert_eq!(parsed, id);
        assert!("not-a-frame".parse::<FrameId>().is_err());
    }

    #[test]
    fn immediate_surface_reports_load() {
        let surface = MemorySurface::new();
        let mut frame = surface.mount(&doc()).unwrap();

        assert!(frame.loaded.try_recv().is_ok());
        assert_eq!(surface.live_frames(), 1);
        assert_eq!(surface.document(frame.id), Some(doc()));
    }

    #[test]
    fn never_surface_waits_for_manual_load() {
        let surface = MemorySurface::with_behaviour(LoadBehaviour::Never);
        let mut frame = surface.mount(&doc()).unwrap();

        assert!(frame.loaded.try_recv().is_err());
        assert!(surface.fire_load(frame.id));
        assert!(frame.loaded.try_recv().is_ok());
    }

    #[test]
    fn failing_surface_mounts_nothing() {
        let surface = MemorySurface::with_behaviour(LoadBehaviour::Fail);

        assert!(surface.mount(&doc()).is_err());
        assert_eq!(surface.live_frames(), 0);
        assert_eq!(surface.mount_count(), 0);
    }

    #[test]
    fn release_drops_frame() {
        let surface = MemorySurface::new();
        let frame = surface.mount(&doc()).unwrap();

        surface.release(frame.id);
        surface.release(FrameId::new());

        assert_eq!(surface.live_frames(), 0);
        assert_eq!(surface.document(frame.id), None);
    }
}
