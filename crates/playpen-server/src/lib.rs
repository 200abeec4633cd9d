//! Development server for the playpen playground.
//!
//! Serves the editor page, pushes compile results and preview frames to it
//! over a WebSocket, and keeps the virtual project in sync with the project
//! directory on disk.

pub mod page;
pub mod server;
pub mod surface;
pub mod watcher;
pub mod websocket;

pub use page::PageRenderer;
pub use server::{DevServer, DevServerConfig, Live, ServerError};
pub use surface::{preview_url, ServedSurface, PREVIEW_ROUTE};
pub use watcher::{FileWatcher, WatchEvent};
pub use websocket::{ClientMessage, HmrHub, ServerMessage};
