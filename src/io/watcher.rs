use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Events sent from the file watcher to the `watch` loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The storage file was written, possibly by another tab.
    Changed,
}

/// Watches the storage file so one tab notices writes made by others.
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<StoreEvent>,
}

impl StoreWatcher {
    /// Start watching `store_path`. The parent directory is watched since
    /// atomic writes replace the file rather than modify it.
    pub fn start(store_path: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let target: PathBuf = store_path.to_path_buf();
        let dir = store_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(_) => return,
                };

                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }

                // Temp files and the lock file live next to the store
                if event.paths.iter().any(|p| is_store_file(p, &target)) {
                    let _ = tx.send(StoreEvent::Changed);
                }
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        Ok(StoreWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking poll. Bursts of events collapse into one.
    pub fn poll(&self) -> Option<StoreEvent> {
        let mut seen = None;
        while let Ok(evt) = self.rx.try_recv() {
            seen = Some(evt);
        }
        seen
    }
}

fn is_store_file(path: &Path, target: &Path) -> bool {
    path == target || (path.file_name().is_some() && path.file_name() == target.file_name())
}
