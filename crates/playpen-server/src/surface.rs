//! Preview surface backed by sandboxed iframes in connected pages.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use playpen_preview::{FrameId, MountedFrame, PreviewDocument, PreviewSurface, SurfaceError};

use crate::websocket::{HmrHub, ServerMessage};

/// Route prefix preview documents are served under.
pub const PREVIEW_ROUTE: &str = "/__preview";

/// URL a frame's document is served from.
pub fn preview_url(id: FrameId) -> String {
    format!("{}/{}", PREVIEW_ROUTE, id)
}

#[derive(Default)]
struct Frames {
    documents: HashMap<FrameId, PreviewDocument>,
    waiters: HashMap<FrameId, oneshot::Sender<()>>,
}

/// Serves mounted documents over HTTP and asks pages to load them.
///
/// Mounting broadcasts a `preview` message; the page creates an iframe for
/// the frame's URL and reports `frame_loaded` back, which completes the
/// frame's load signal.
pub struct ServedSurface {
    hub: HmrHub,
    frames: Mutex<Frames>,
}

impl ServedSurface {
    pub fn new(hub: HmrHub) -> Self {
        Self {
            hub,
            frames: Mutex::new(Frames::default()),
        }
    }

    /// Document of a live frame.
    pub fn document(&self, id: FrameId) -> Option<PreviewDocument> {
        self.frames.lock().documents.get(&id).cloned()
    }

    /// Complete a frame's load signal. Returns false if nothing was waiting.
    pub fn notify_loaded(&self, id: FrameId) -> bool {
        match self.frames.lock().waiters.remove(&id) {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

impl PreviewSurface for ServedSurface {
    fn mount(&self, document: &PreviewDocument) -> Result<MountedFrame, SurfaceError> {
        let id = FrameId::new();
        let (tx, rx) = oneshot::channel();

        {
            let mut frames = self.frames.lock();
            frames.documents.insert(id, document.clone());
            frames.waiters.insert(id, tx);
        }

        if self.hub.subscriber_count() == 0 {
            tracing::debug!("No page connected to load preview frame {}", id);
        }
        self.hub.send(ServerMessage::Preview {
            id,
            url: preview_url(id),
        });

        Ok(MountedFrame { id, loaded: rx })
    }

    fn release(&self, id: FrameId) {
        let mut frames = self.frames.lock();
        frames.documents.remove(&id);
        frames.waiters.remove(&id);
    }

    fn live_frames(&self) -> usize {
        self.frames.lock().documents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> PreviewDocument {
        PreviewDocument {
            html: "<!DOCTYPE html><p>hi</p>".to_string(),
        }
    }

    #[test]
    fn mount_broadcasts_preview_url() {
        let hub = HmrHub::new();
        let mut rx = hub.subscribe();
        let surface = ServedSurface::new(hub);

        let frame = surface.mount(&doc()).unwrap();

        match rx.try_recv() {
            Ok(ServerMessage::Preview { id, url }) => {
                assert_eq!(id, frame.id);
                assert_eq!(url, format!("/__preview/{}", frame.id));
            }
            other => panic!("Expected Preview, got {:?}", other),
        }
        assert_eq!(surface.document(frame.id), Some(doc()));
    }

    #[test]
    fn frame_loaded_completes_load_signal() {
        let surface = ServedSurface::new(HmrHub::new());
        let mut frame = surface.mount(&doc()).unwrap();

        assert!(frame.loaded.try_recv().is_err());
        assert!(surface.notify_loaded(frame.id));
        assert!(frame.loaded.try_recv().is_ok());
        assert!(!surface.notify_loaded(frame.id));
    }

    #[test]
    fn released_frames_are_no_longer_served() {
        let surface = ServedSurface::new(HmrHub::new());
        let frame = surface.mount(&doc()).unwrap();

        surface.release(frame.id);

        assert_eq!(surface.document(frame.id), None);
        assert_eq!(surface.live_frames(), 0);
        assert!(!surface.notify_loaded(frame.id));
    }
}
