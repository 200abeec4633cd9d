//! File watching for the project directory.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File was created or modified
    Changed(PathBuf),

    /// File was deleted
    Removed(PathBuf),
}

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for `root`, recursively.
    ///
    /// Returns the watcher and a channel to receive events. Events are not
    /// debounced here; the live loop debounces compiles.
    pub fn new(root: &Path) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(std::io::Error::other)?;

        std::thread::spawn(move || {
            while let Ok(event) = sync_rx.recv() {
                for path in event.paths {
                    if let Some(e) = classify_event(path, &event.kind) {
                        if async_tx.blocking_send(e).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: PathBuf, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::event::{ModifyKind, RenameMode};
    use notify::EventKind;

    match kind {
        EventKind::Create(_) => Some(WatchEvent::Changed(path)),
        EventKind::Remove(_) => Some(WatchEvent::Removed(path)),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(WatchEvent::Removed(path)),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => {
            if path.exists() {
                Some(WatchEvent::Changed(path))
            } else {
                Some(WatchEvent::Removed(path))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, ModifyKind, RemoveKind};
    use notify::EventKind;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn classifies_event_kinds() {
        let path = PathBuf::from("/nowhere/main.ts");

        assert_eq!(
            classify_event(path.clone(), &EventKind::Create(CreateKind::File)),
            Some(WatchEvent::Changed(path.clone()))
        );
        assert_eq!(
            classify_event(path.clone(), &EventKind::Remove(RemoveKind::File)),
            Some(WatchEvent::Removed(path.clone()))
        );
        assert_eq!(
            classify_event(
                path.clone(),
                &EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))
            ),
            None
        );
        // Modified but already gone
        assert_eq!(
            classify_event(
                path.clone(),
                &EventKind::Modify(ModifyKind::Data(DataChange::Content))
            ),
            Some(WatchEvent::Removed(path))
        );
    }

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("main.ts");

        let (watcher, mut rx) = FileWatcher::new(temp.path()).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, "export {};").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        assert!(event.unwrap().is_some(), "channel should not be closed");
    }
}
