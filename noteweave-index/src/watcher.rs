//! Filesystem watcher producing [`ChangeEvent`]s for the ingestion task.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

use crate::errors::IndexResult;
use crate::ingest::{ChangeEvent, ChangeKind};
use crate::paths::is_markdown;

/// Maps watcher paths under a notes root to change events.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    root: PathBuf,
    trash_folder: String,
}

impl EventClassifier {
    pub fn new(root: impl Into<PathBuf>, trash_folder: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            trash_folder: trash_folder.into(),
        }
    }

    /// Change events for one notify event. Paths outside `<root>/<folder>/`
    /// and non-markdown files produce nothing.
    pub fn classify(&self, event: &notify::Event) -> Vec<ChangeEvent> {
        match event.kind {
            EventKind::Create(CreateKind::Folder) => self.dir_events(&event.paths, ChangeKind::AddDir),
            EventKind::Remove(RemoveKind::Folder) => self.dir_events(&event.paths, ChangeKind::UnlinkDir),
            EventKind::Create(_) => event
                .paths
                .iter()
                .filter_map(|path| {
                    let kind = if path.is_dir() { ChangeKind::AddDir } else { ChangeKind::Add };
                    self.map_path(path, kind)
                })
                .collect(),
            EventKind::Remove(_) => event
                .paths
                .iter()
                .filter_map(|path| {
                    let kind = if is_markdown(path) { ChangeKind::Unlink } else { ChangeKind::UnlinkDir };
                    self.map_path(path, kind)
                })
                .collect(),
            EventKind::Modify(ModifyKind::Name(mode)) => {
                let mut out = Vec::new();
                match (mode, event.paths.as_slice()) {
                    (RenameMode::Both, [from, to, ..]) => {
                        out.extend(self.map_path(from, removal_kind(from)));
                        out.extend(self.map_path(to, arrival_kind(to)));
                    }
                    (RenameMode::From, paths) => {
                        out.extend(paths.iter().filter_map(|p| self.map_path(p, removal_kind(p))));
                    }
                    (RenameMode::To, paths) => {
                        out.extend(paths.iter().filter_map(|p| self.map_path(p, arrival_kind(p))));
                    }
                    (_, paths) => {
                        out.extend(paths.iter().filter_map(|p| {
                            let kind = if p.exists() { arrival_kind(p) } else { removal_kind(p) };
                            self.map_path(p, kind)
                        }));
                    }
                }
                out
            }
            EventKind::Modify(_) => event
                .paths
                .iter()
                .filter_map(|path| self.map_path(path, ChangeKind::Change))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn dir_events(&self, paths: &[PathBuf], kind: ChangeKind) -> Vec<ChangeEvent> {
        paths.iter().filter_map(|path| self.map_path(path, kind)).collect()
    }

    fn map_path(&self, path: &Path, kind: ChangeKind) -> Option<ChangeEvent> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|component| match component {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;

        let folder = *parts.first()?;
        if folder.starts_with('.') || folder == self.trash_folder {
            return None;
        }
        let filename = match (kind.is_dir(), parts.as_slice()) {
            (true, [_]) => String::new(),
            (false, [_, file]) if is_markdown(Path::new(file)) && !file.starts_with('.') => {
                file.to_string()
            }
            _ => return None,
        };

        Some(ChangeEvent {
            event: kind,
            folder: folder.to_string(),
            filename,
            path: path.to_path_buf(),
        })
    }
}

fn arrival_kind(path: &Path) -> ChangeKind {
    if path.is_dir() { ChangeKind::AddDir } else { ChangeKind::Add }
}

fn removal_kind(path: &Path) -> ChangeKind {
    if is_markdown(path) { ChangeKind::Unlink } else { ChangeKind::UnlinkDir }
}

/// Coalesces repeated `(event, path)` pairs inside a quiet window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<(ChangeKind, PathBuf), (ChangeEvent, Instant, u64)>,
    sequence: u64,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
            sequence: 0,
        }
    }

    /// Record an event. A repeat of a pending pair restarts its window.
    pub fn push(&mut self, event: ChangeEvent, now: Instant) {
        let key = (event.event, event.path.clone());
        let order = match self.pending.get(&key) {
            Some((_, _, order)) => *order,
            None => {
                self.sequence += 1;
                self.sequence
            }
        };
        self.pending.insert(key, (event, now, order));
    }

    /// Events whose window has elapsed, in first-seen order.
    pub fn drain_ready(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let ready: Vec<(ChangeKind, PathBuf)> = self
            .pending
            .iter()
            .filter(|(_, (_, seen, _))| now.duration_since(*seen) >= self.window)
            .map(|(key, _)| key.clone())
            .collect();
        let mut events: Vec<(u64, ChangeEvent)> = ready
            .into_iter()
            .filter_map(|key| self.pending.remove(&key))
            .map(|(event, _, order)| (order, event))
            .collect();
        events.sort_by_key(|(order, _)| *order);
        events.into_iter().map(|(_, event)| event).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Watch `root` recursively and forward debounced change events to `tx`
/// until the receiver is dropped.
pub async fn run_watcher(
    root: PathBuf,
    trash_folder: String,
    debounce: Duration,
    tx: mpsc::Sender<ChangeEvent>,
) -> IndexResult<()> {
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Event>();
    let mut watcher: RecommendedWatcher =
        notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let _ = raw_tx.send(event);
            }
            Err(err) => warn!("notes watcher error: {err}"),
        })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tracing::info!(root = %root.display(), "watching notes root");

    let classifier = EventClassifier::new(root, trash_folder);
    let mut debouncer = Debouncer::new(debounce);
    let tick = debounce.max(Duration::from_millis(10));
    loop {
        tokio::select! {
            received = raw_rx.recv() => {
                let Some(event) = received else {
                    return Ok(());
                };
                let now = Instant::now();
                for change in classifier.classify(&event) {
                    debouncer.push(change, now);
                }
            }
            _ = tokio::time::sleep(tick), if !debouncer.is_empty() => {
                for change in debouncer.drain_ready(Instant::now()) {
                    if tx.send(change).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use notify::event::{DataChange, EventAttributes};

    use super::*;

    fn notify_event(kind: EventKind, paths: &[&Path]) -> notify::Event {
        notify::Event {
            kind,
            paths: paths.iter().map(|p| p.to_path_buf()).collect(),
            attrs: EventAttributes::new(),
        }
    }

    #[test]
    fn classifies_file_events() {
        let root = Path::new("/notes");
        let classifier = EventClassifier::new(root, ".trash");

        let modified = classifier.classify(&notify_event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &[&root.join("default/Note A.md")],
        ));
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].event, ChangeKind::Change);
        assert_eq!(modified[0].folder, "default");
        assert_eq!(modified[0].filename, "Note A.md");

        let removed = classifier.classify(&notify_event(
            EventKind::Remove(RemoveKind::File),
            &[&root.join("work/Plan.md")],
        ));
        assert_eq!(removed[0].event, ChangeKind::Unlink);
    }

    #[test]
    fn rename_becomes_unlink_and_add() {
        let root = Path::new("/notes");
        let classifier = EventClassifier::new(root, ".trash");
        let events = classifier.classify(&notify_event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[&root.join("default/Old.md"), &root.join("default/New.md")],
        ));
        let kinds: Vec<(ChangeKind, &str)> =
            events.iter().map(|e| (e.event, e.filename.as_str())).collect();
        assert_eq!(kinds, vec![(ChangeKind::Unlink, "Old.md"), (ChangeKind::Add, "New.md")]);
    }

    #[test]
    fn ignores_temp_trash_hidden_and_nested_paths() {
        let root = Path::new("/notes");
        let classifier = EventClassifier::new(root, ".trash");
        let modify = EventKind::Modify(ModifyKind::Any);
        for path in [
            "default/Note.md.tmp",
            "default/image.png",
            ".trash/Note.md",
            ".git/HEAD",
            "default/sub/deep.md",
            "loose.md",
        ] {
            let events = classifier.classify(&notify_event(modify, &[&root.join(path)]));
            assert!(events.is_empty(), "{path}");
        }
        assert!(classifier
            .classify(&notify_event(modify, &[Path::new("/elsewhere/default/x.md")]))
            .is_empty());
    }

    #[test]
    fn folder_events_map_to_dir_kinds() {
        let root = Path::new("/notes");
        let classifier = EventClassifier::new(root, ".trash");
        let added = classifier.classify(&notify_event(
            EventKind::Create(CreateKind::Folder),
            &[&root.join("projects")],
        ));
        assert_eq!(added[0].event, ChangeKind::AddDir);
        assert_eq!(added[0].folder, "projects");
        assert!(added[0].filename.is_empty());
    }

    fn change(kind: ChangeKind, name: &str) -> ChangeEvent {
        ChangeEvent {
            event: kind,
            folder: "default".to_string(),
            filename: name.to_string(),
            path: PathBuf::from("/notes/default").join(name),
        }
    }

    #[test]
    fn debouncer_coalesces_pairs_and_keeps_order() {
        let window = Duration::from_millis(300);
        let mut debouncer = Debouncer::new(window);
        let start = Instant::now();

        debouncer.push(change(ChangeKind::Change, "A.md"), start);
        debouncer.push(change(ChangeKind::Add, "B.md"), start);
        debouncer.push(change(ChangeKind::Change, "A.md"), start + Duration::from_millis(100));
        debouncer.push(change(ChangeKind::Unlink, "A.md"), start + Duration::from_millis(50));

        assert!(debouncer.drain_ready(start + Duration::from_millis(200)).is_empty());

        let ready = debouncer.drain_ready(start + Duration::from_millis(360));
        let kinds: Vec<(ChangeKind, &str)> =
            ready.iter().map(|e| (e.event, e.filename.as_str())).collect();
        assert_eq!(kinds, vec![(ChangeKind::Add, "B.md"), (ChangeKind::Unlink, "A.md")]);

        let rest = debouncer.drain_ready(start + Duration::from_millis(400));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].event, ChangeKind::Change);
        assert!(debouncer.is_empty());
    }
}
