use crate::error::Result;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

/// A filesystem change relevant to the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
}

/// Recursive watch over a project root, delivering translated events
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::Receiver<notify::Result<Event>>,
}

impl FileWatcher {
    pub fn new(root: &Path) -> Result<Self> {
        let (sender, events) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |event| {
                // Receiver gone means the watcher is being dropped
                let _ = sender.send(event);
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        log::info!("Watching {}", root.display());

        Ok(Self {
            _watcher: watcher,
            events,
        })
    }

    /// Block until the next relevant events arrive; `None` once the watch ends
    pub fn recv(&self) -> Option<Vec<FileEvent>> {
        loop {
            match self.events.recv() {
                Ok(Ok(event)) => {
                    let translated = translate(&event);
                    if !translated.is_empty() {
                        return Some(translated);
                    }
                }
                Ok(Err(e)) => log::warn!("Watch error: {e}"),
                Err(_) => return None,
            }
        }
    }

    /// Like `recv`, giving up with an empty batch after `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Vec<FileEvent>> {
        match self.events.recv_timeout(timeout) {
            Ok(Ok(event)) => Some(translate(&event)),
            Ok(Err(e)) => {
                log::warn!("Watch error: {e}");
                Some(Vec::new())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Some(Vec::new()),
            Err(mpsc::RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Map a raw notification onto index operations.
///
/// Directory creation and modification, access and metadata changes produce
/// nothing. Removals are kept for directories too so their contents can be
/// dropped by prefix.
pub fn translate(event: &Event) -> Vec<FileEvent> {
    let files = || {
        event
            .paths
            .iter()
            .filter(|path| !path.is_dir())
            .cloned()
    };

    match &event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => files().map(FileEvent::Created).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![FileEvent::Moved {
                from: from.clone(),
                to: to.clone(),
            }],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().cloned().map(FileEvent::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Rename target (or unknown half): index it if it is there now
            event
                .paths
                .iter()
                .map(|path| {
                    if path.exists() {
                        FileEvent::Created(path.clone())
                    } else {
                        FileEvent::Deleted(path.clone())
                    }
                })
                .collect()
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => files().map(FileEvent::Modified).collect(),
        EventKind::Remove(_) => event.paths.iter().cloned().map(FileEvent::Deleted).collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, MetadataKind, RemoveKind};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn event(kind: EventKind, paths: &[&Path]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(path.to_path_buf()))
    }

    #[test]
    fn test_create_and_modify() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("a.py");
        fs::write(&file, "x = 1").unwrap();

        assert_eq!(
            translate(&event(EventKind::Create(CreateKind::File), &[&file])),
            vec![FileEvent::Created(file.clone())]
        );
        assert_eq!(
            translate(&event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &[&file]
            )),
            vec![FileEvent::Modified(file)]
        );
    }

    #[test]
    fn test_directories_and_noise_skipped() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("pkg");
        fs::create_dir(&dir).unwrap();

        assert!(translate(&event(EventKind::Create(CreateKind::Folder), &[&dir])).is_empty());
        assert!(translate(&event(EventKind::Create(CreateKind::Any), &[&dir])).is_empty());
        assert!(translate(&event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &[&dir]
        ))
        .is_empty());
        assert!(translate(&event(EventKind::Access(AccessKind::Any), &[&dir])).is_empty());
    }

    #[test]
    fn test_rename_pairs_become_moves() {
        let from = Path::new("/proj/old.py");
        let to = Path::new("/proj/new.py");

        assert_eq!(
            translate(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &[from, to]
            )),
            vec![FileEvent::Moved {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            }]
        );
        assert_eq!(
            translate(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &[from]
            )),
            vec![FileEvent::Deleted(from.to_path_buf())]
        );
    }

    #[test]
    fn test_removal_kept_for_missing_paths() {
        let gone = Path::new("/proj/gone");
        assert_eq!(
            translate(&event(EventKind::Remove(RemoveKind::Folder), &[gone])),
            vec![FileEvent::Deleted(gone.to_path_buf())]
        );
    }
}
