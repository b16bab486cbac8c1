//! Filesystem watcher implementation

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};
use wikigraph_core::{CorpusRoot, DocPath};

use crate::coalescer::ChangeCoalescer;

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File or directory created
    Created(PathBuf),
    /// File or directory modified
    Modified(PathBuf),
    /// File or directory removed
    Removed(PathBuf),
    /// File or directory moved within the watched tree
    Renamed { from: PathBuf, to: PathBuf },
}

/// File system watcher for monitoring corpus changes
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    watched_paths: HashSet<PathBuf>,
    root_path: PathBuf,
}

impl FileWatcher {
    /// Create a new file watcher for the given root path
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => {
                    debug!("File system event: {:?}", event);
                    for watch_event in translate_event(event) {
                        if let Err(e) = event_tx.send(watch_event) {
                            warn!("Failed to forward watch event: {}", e);
                        }
                    }
                }
                Err(e) => {
                    error!("File system watch error: {}", e);
                }
            }
        })?;

        Ok(Self {
            watcher,
            event_rx,
            watched_paths: HashSet::new(),
            root_path,
        })
    }

    /// Watch a directory recursively
    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Watching directory: {:?}", path);

        self.watcher.watch(path, RecursiveMode::Recursive)?;
        self.watched_paths.insert(path.to_path_buf());
        Ok(())
    }

    /// Stop watching a path
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Stopping watch for: {:?}", path);

        self.watcher.unwatch(path)?;
        self.watched_paths.remove(path);
        Ok(())
    }

    /// Get the event receiver
    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }

    /// Check if a path is being watched
    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched_paths.contains(path)
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

/// Convert a notify event into watch events, dropping ignored paths.
///
/// A rename reported with both ends becomes `Renamed`; when only one end is
/// known it degrades to a removal or a creation.
fn translate_event(event: notify::Event) -> Vec<WatchEvent> {
    let mut paths = event.paths.into_iter();
    let events = match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            match (paths.next(), paths.next()) {
                (Some(from), Some(to)) => match (should_ignore_path(&from), should_ignore_path(&to)) {
                    (false, false) => vec![WatchEvent::Renamed { from, to }],
                    (false, true) => vec![WatchEvent::Removed(from)],
                    (true, false) => vec![WatchEvent::Created(to)],
                    (true, true) => Vec::new(),
                },
                (Some(path), None) => vec![WatchEvent::Modified(path)],
                _ => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => paths.map(WatchEvent::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => paths.map(WatchEvent::Created).collect(),
        EventKind::Create(_) => paths.map(WatchEvent::Created).collect(),
        EventKind::Modify(_) => paths.map(WatchEvent::Modified).collect(),
        EventKind::Remove(_) => paths.map(WatchEvent::Removed).collect(),
        _ => Vec::new(),
    };

    events
        .into_iter()
        .filter(|event| match event {
            WatchEvent::Created(path) | WatchEvent::Modified(path) | WatchEvent::Removed(path) => {
                !should_ignore_path(path)
            }
            WatchEvent::Renamed { .. } => true,
        })
        .collect()
}

/// Watcher service that feeds corpus changes into the change coalescer
pub struct WatcherService {
    watcher: Arc<RwLock<FileWatcher>>,
    root: CorpusRoot,
    coalescer: Arc<ChangeCoalescer>,
}

impl WatcherService {
    pub fn new(root: CorpusRoot, coalescer: Arc<ChangeCoalescer>) -> Result<Self> {
        let watcher = FileWatcher::new(root.path())
            .with_context(|| format!("failed to create watcher for {}", root.path().display()))?;
        Ok(Self {
            watcher: Arc::new(RwLock::new(watcher)),
            root,
            coalescer,
        })
    }

    pub fn coalescer(&self) -> &Arc<ChangeCoalescer> {
        &self.coalescer
    }

    /// Start watching the corpus root
    pub async fn start_watching(&self) -> Result<()> {
        let mut watcher = self.watcher.write().await;
        let root_path = watcher.root_path().to_path_buf();
        watcher.watch_directory(&root_path)?;

        info!("Started watching corpus: {:?}", root_path);
        Ok(())
    }

    /// Forward watch events to the coalescer until the watcher is dropped
    pub async fn process_events(&self) -> Result<()> {
        let mut watcher = self.watcher.write().await;
        let event_rx = watcher.event_receiver();

        while let Some(event) = event_rx.recv().await {
            debug!("Processing watch event: {:?}", event);
            self.apply(event).await;
        }

        self.coalescer.shutdown();
        Ok(())
    }

    /// Route one event. Changes are debounced, deletions applied at once.
    ///
    /// Directories are expanded: a removed or renamed directory drops every
    /// document tracked below it, a directory appearing schedules its contents.
    pub async fn apply(&self, event: WatchEvent) {
        match event {
            WatchEvent::Created(path) => {
                if let Some(doc) = self.root.doc_path(&path) {
                    self.arrived(&path, doc).await;
                }
            }
            WatchEvent::Modified(path) => {
                if path.is_dir() {
                    return;
                }
                if let Some(doc) = self.root.doc_path(&path) {
                    self.coalescer.notify(doc);
                }
            }
            WatchEvent::Removed(path) => {
                if let Some(doc) = self.root.doc_path(&path) {
                    info!("Removed: {}", doc);
                    self.coalescer.notify_removed_tree(&doc).await;
                }
            }
            WatchEvent::Renamed { from, to } => {
                match (self.root.doc_path(&from), self.root.doc_path(&to)) {
                    (Some(old), Some(new)) => {
                        info!("Renamed: {} -> {}", old, new);
                        self.coalescer.notify_removed_tree(&old).await;
                        self.arrived(&to, new).await;
                    }
                    (Some(old), None) => {
                        self.coalescer.notify_removed_tree(&old).await;
                    }
                    (None, Some(new)) => self.arrived(&to, new).await,
                    (None, None) => {}
                }
            }
        }
    }

    async fn arrived(&self, path: &Path, doc: DocPath) {
        if path.is_dir() {
            self.coalescer.notify_tree(&doc).await;
        } else {
            self.coalescer.notify(doc);
        }
    }
}

/// Check if a path should be ignored (e.g., .git/, node_modules/, etc.)
fn should_ignore_path(path: &Path) -> bool {
    path.components().any(|component| {
        matches!(
            component.as_os_str().to_str(),
            Some(".git" | "node_modules" | ".obsidian" | ".trash")
        )
    })
}
