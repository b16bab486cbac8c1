//! Per-path debouncing of filesystem notifications
//!
//! Editors often write a file several times in quick succession. Each
//! `notify` restarts the path's quiet timer; the index only sees one upsert
//! once the path has been quiet for the configured interval, and the content
//! is read at that point.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use wikigraph_core::{DocPath, IndexEvent};
use wikigraph_indexer::IndexSink;

#[derive(Debug)]
struct PendingUpsert {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Coalesces rapid changes per path before handing them to an [`IndexSink`]
pub struct ChangeCoalescer {
    quiet: Duration,
    sink: Arc<dyn IndexSink>,
    /// Scheduled or in-flight upsert per path
    pending: Arc<DashMap<DocPath, PendingUpsert>>,
    generation: AtomicU64,
}

impl ChangeCoalescer {
    pub fn new(quiet: Duration, sink: Arc<dyn IndexSink>) -> Self {
        Self {
            quiet,
            sink,
            pending: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Schedule an upsert of `path`, replacing any pending one.
    pub fn notify(&self, path: DocPath) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);

        // The shard lock is held while spawning so the task cannot clear
        // its entry before it is stored.
        match self.pending.entry(path.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get().handle.abort();
                tracing::debug!("Rescheduled upsert of {}", path);
                let handle = self.spawn_upsert(path, generation);
                entry.insert(PendingUpsert { generation, handle });
            }
            Entry::Vacant(entry) => {
                let handle = self.spawn_upsert(path, generation);
                entry.insert(PendingUpsert { generation, handle });
            }
        }
    }

    fn spawn_upsert(&self, path: DocPath, generation: u64) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        let pending = Arc::clone(&self.pending);
        let quiet = self.quiet;
        tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            if let Some(event) = sink.upsert(&path).await {
                tracing::debug!("Applied {:?}", event);
            }
            pending.remove_if(&path, |_, p| p.generation == generation);
        })
    }

    /// Apply a deletion immediately, cancelling any pending upsert of `path`.
    ///
    /// An upsert already past its quiet period is awaited first so it cannot
    /// land after the removal.
    pub async fn notify_removed(&self, path: &DocPath) -> Option<IndexEvent> {
        if let Some((_, pending)) = self.pending.remove(path) {
            pending.handle.abort();
            let _ = pending.handle.await;
            tracing::debug!("Cancelled pending upsert of deleted {}", path);
        }
        self.sink.remove(path).await
    }

    /// Remove `path` and, when it was a directory, every document below it.
    pub async fn notify_removed_tree(&self, path: &DocPath) -> Vec<IndexEvent> {
        let mut doomed: BTreeSet<DocPath> = self.sink.tracked_under(path).await.into_iter().collect();
        doomed.extend(
            self.pending
                .iter()
                .filter(|entry| entry.key().is_under(path))
                .map(|entry| entry.key().clone()),
        );
        doomed.insert(path.clone());

        let mut events = Vec::new();
        for doc in &doomed {
            if let Some(event) = self.notify_removed(doc).await {
                events.push(event);
            }
        }
        if doomed.len() > 1 {
            tracing::info!("Removed directory {} ({} documents)", path, events.len());
        }
        events
    }

    /// Schedule an upsert of every eligible document inside the directory `dir`.
    pub async fn notify_tree(&self, dir: &DocPath) -> usize {
        let paths = self.sink.documents_under(dir).await;
        let count = paths.len();
        for path in paths {
            self.notify(path);
        }
        tracing::debug!("Scheduled {} documents below {}", count, dir);
        count
    }

    /// A rename is a deletion of `from` and a change of `to`.
    pub async fn notify_renamed(&self, from: &DocPath, to: DocPath) -> Option<IndexEvent> {
        let removed = self.notify_removed(from).await;
        self.notify(to);
        removed
    }

    /// Cancel every pending upsert without running it.
    pub fn shutdown(&self) {
        let paths: Vec<DocPath> = self.pending.iter().map(|e| e.key().clone()).collect();
        for path in paths {
            if let Some((_, pending)) = self.pending.remove(&path) {
                pending.handle.abort();
            }
        }
        tracing::info!("Change coalescer stopped");
    }

    /// Number of paths with a scheduled or in-flight upsert
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn quiet(&self) -> Duration {
        self.quiet
    }
}

impl Drop for ChangeCoalescer {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            entry.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wikigraph_core::{LinkIndex, WorkspaceConfig};
    use wikigraph_indexer::{Indexer, MemorySource};

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(&'static str, DocPath)>>,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<(&'static str, DocPath)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IndexSink for RecordingSink {
        async fn upsert(&self, path: &DocPath) -> Option<IndexEvent> {
            self.calls.lock().unwrap().push(("upsert", path.clone()));
            None
        }

        async fn remove(&self, path: &DocPath) -> Option<IndexEvent> {
            self.calls.lock().unwrap().push(("remove", path.clone()));
            None
        }
    }

    fn coalescer(sink: Arc<RecordingSink>) -> ChangeCoalescer {
        ChangeCoalescer::new(Duration::from_millis(300), sink)
    }

    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_changes_collapse_into_one_upsert() {
        let sink = Arc::new(RecordingSink::default());
        let coalescer = coalescer(sink.clone());
        let path = DocPath::new("/A.md");

        for _ in 0..5 {
            coalescer.notify(path.clone());
            settle(100).await;
        }
        assert!(sink.calls().is_empty());
        assert_eq!(coalescer.pending_count(), 1);

        settle(1000).await;
        assert_eq!(sink.calls(), vec![("upsert", path)]);
        assert_eq!(coalescer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paths_are_debounced_independently() {
        let sink = Arc::new(RecordingSink::default());
        let coalescer = coalescer(sink.clone());

        coalescer.notify(DocPath::new("/A.md"));
        coalescer.notify(DocPath::new("/B.md"));
        assert_eq!(coalescer.pending_count(), 2);

        settle(1000).await;
        let mut calls = sink.calls();
        calls.sort_by(|a, b| a.1.cmp(&b.1));
        assert_eq!(
            calls,
            vec![("upsert", DocPath::new("/A.md")), ("upsert", DocPath::new("/B.md"))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_bypasses_and_cancels_pending_upsert() {
        let sink = Arc::new(RecordingSink::default());
        let coalescer = coalescer(sink.clone());
        let path = DocPath::new("/A.md");

        coalescer.notify(path.clone());
        coalescer.notify_removed(&path).await;
        assert_eq!(sink.calls(), vec![("remove", path.clone())]);

        settle(1000).await;
        assert_eq!(sink.calls(), vec![("remove", path)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_removes_old_and_schedules_new() {
        let sink = Arc::new(RecordingSink::default());
        let coalescer = coalescer(sink.clone());

        coalescer
            .notify_renamed(&DocPath::new("/Old.md"), DocPath::new("/New.md"))
            .await;
        assert_eq!(sink.calls(), vec![("remove", DocPath::new("/Old.md"))]);

        settle(1000).await;
        assert_eq!(
            sink.calls(),
            vec![("remove", DocPath::new("/Old.md")), ("upsert", DocPath::new("/New.md"))]
        );
    }

    /// Sink whose upserts block their worker before recording.
    #[derive(Default)]
    struct SlowUpsertSink {
        calls: Mutex<Vec<(&'static str, DocPath)>>,
    }

    #[async_trait]
    impl IndexSink for SlowUpsertSink {
        async fn upsert(&self, path: &DocPath) -> Option<IndexEvent> {
            std::thread::sleep(Duration::from_millis(200));
            self.calls.lock().unwrap().push(("upsert", path.clone()));
            None
        }

        async fn remove(&self, path: &DocPath) -> Option<IndexEvent> {
            self.calls.lock().unwrap().push(("remove", path.clone()));
            None
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_removal_waits_for_in_flight_upsert() {
        let sink = Arc::new(SlowUpsertSink::default());
        let coalescer = ChangeCoalescer::new(Duration::from_millis(10), sink.clone());
        let path = DocPath::new("/A.md");

        coalescer.notify(path.clone());
        settle(50).await;
        coalescer.notify_removed(&path).await;

        assert_eq!(
            sink.calls.lock().unwrap().clone(),
            vec![("upsert", path.clone()), ("remove", path)]
        );
        assert_eq!(coalescer.pending_count(), 0);
    }

    fn memory_indexer(docs: &[(&str, &str)]) -> (Arc<Indexer>, Arc<MemorySource>) {
        let config = WorkspaceConfig::default();
        let source = Arc::new(MemorySource::with_documents(docs.iter().copied()));
        let indexer = Indexer::new(LinkIndex::with_config(&config), source.clone(), &config).unwrap();
        (Arc::new(indexer), source)
    }

    #[tokio::test(start_paused = true)]
    async fn test_directory_removal_drops_every_document_below() {
        let (indexer, _source) = memory_indexer(&[
            ("/notes/A.md", "[[B]]"),
            ("/notes/deep/C.md", ""),
            ("/B.md", "[[A]]"),
        ]);
        indexer.rebuild().await.unwrap();
        let coalescer = ChangeCoalescer::new(Duration::from_millis(300), indexer.clone());
        coalescer.notify(DocPath::new("/notes/Draft.md"));

        let events = coalescer.notify_removed_tree(&DocPath::new("/notes")).await;
        assert_eq!(
            events,
            vec![
                IndexEvent::Deleted { path: DocPath::new("/notes/A.md") },
                IndexEvent::Deleted { path: DocPath::new("/notes/deep/C.md") },
            ]
        );
        assert_eq!(coalescer.pending_count(), 0);

        let index = indexer.index();
        let index = index.read().await;
        let tracked: Vec<&DocPath> = index.documents().collect();
        assert_eq!(tracked, vec![&DocPath::new("/B.md")]);
        assert!(index.back_links(&DocPath::new("/B.md")).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_directory_arrival_schedules_its_documents() {
        let (indexer, source) = memory_indexer(&[("/B.md", "")]);
        indexer.rebuild().await.unwrap();
        source.insert(DocPath::new("/archive/A.md"), "[[B]]");
        source.insert(DocPath::new("/archive/old/C.md"), "");

        let coalescer = ChangeCoalescer::new(Duration::from_millis(300), indexer.clone());
        assert_eq!(coalescer.notify_tree(&DocPath::new("/archive")).await, 2);
        assert_eq!(coalescer.pending_count(), 2);

        settle(1000).await;
        let index = indexer.index();
        let index = index.read().await;
        assert_eq!(index.back_links(&DocPath::new("/B.md")), &[DocPath::new("/archive/A.md")]);
        assert!(index.is_tracked(&DocPath::new("/archive/old/C.md")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_without_firing() {
        let sink = Arc::new(RecordingSink::default());
        let coalescer = coalescer(sink.clone());

        coalescer.notify(DocPath::new("/A.md"));
        coalescer.notify(DocPath::new("/B.md"));
        coalescer.shutdown();
        assert_eq!(coalescer.pending_count(), 0);

        settle(1000).await;
        assert!(sink.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upsert_reads_content_at_fire_time() {
        let config = WorkspaceConfig::default();
        let source = Arc::new(MemorySource::with_documents([
            ("/A.md", "[[B]]"),
            ("/B.md", ""),
            ("/C.md", ""),
        ]));
        let indexer = Arc::new(Indexer::new(LinkIndex::with_config(&config), source.clone(), &config).unwrap());
        indexer.rebuild().await.unwrap();
        let index = indexer.index();
        let mut events = index.write().await.subscribe_channel(16);

        let coalescer = ChangeCoalescer::new(config.debounce(), indexer.clone());
        let a = DocPath::new("/A.md");
        for (i, text) in ["[[B]] draft", "[[C]] draft", "[[C]]"].iter().enumerate() {
            source.insert(a.clone(), *text);
            coalescer.notify(a.clone());
            settle(50 * (i as u64 + 1)).await;
        }
        settle(1000).await;

        assert_eq!(events.try_recv().unwrap(), IndexEvent::Updated { path: a.clone() });
        assert!(events.try_recv().is_err());

        let index = index.read().await;
        assert!(index.links_to(&a, &DocPath::new("/C.md")));
        assert!(index.back_links(&DocPath::new("/B.md")).is_empty());
    }
}
