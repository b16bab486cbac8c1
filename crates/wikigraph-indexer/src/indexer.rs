//! Drives the link index from a document source
//!
//! Document text is read without holding the index lock; the lock is only
//! taken for the synchronous mutation that follows. Single-path changes wait
//! for a running `rebuild` so its bulk populate cannot overwrite them.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use wikigraph_core::{
    CorpusRoot, DocPath, DocumentUpdate, IndexEvent, InclusionRules, LinkIndex, LinkSyntax,
    WorkspaceConfig,
};

use crate::error::SourceError;
use crate::link_parser::extract_targets;
use crate::source::{DocumentSource, FsSource};

/// Receives settled per-path changes, e.g. from the change coalescer.
#[async_trait]
pub trait IndexSink: Send + Sync {
    async fn upsert(&self, path: &DocPath) -> Option<IndexEvent>;
    async fn remove(&self, path: &DocPath) -> Option<IndexEvent>;

    /// Tracked documents inside the directory `dir`.
    async fn tracked_under(&self, _dir: &DocPath) -> Vec<DocPath> {
        Vec::new()
    }

    /// Eligible documents currently present inside the directory `dir`.
    async fn documents_under(&self, _dir: &DocPath) -> Vec<DocPath> {
        Vec::new()
    }
}

pub struct Indexer {
    index: Arc<RwLock<LinkIndex>>,
    source: Arc<dyn DocumentSource>,
    rules: InclusionRules,
    syntax: LinkSyntax,
    /// Shared by single-path changes, exclusive for `rebuild`.
    gate: RwLock<()>,
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("syntax", &self.syntax)
            .field("rules", &self.rules)
            .finish()
    }
}

impl Indexer {
    pub fn new(
        index: LinkIndex,
        source: Arc<dyn DocumentSource>,
        config: &WorkspaceConfig,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            index: Arc::new(RwLock::new(index)),
            source,
            rules: config.inclusion_rules()?,
            syntax: config.link_syntax,
            gate: RwLock::new(()),
        })
    }

    /// Index backed by the files below `root`. Nothing is read until `rebuild`.
    pub fn open(root: impl AsRef<Path>, config: &WorkspaceConfig) -> Result<Self, SourceError> {
        let root = CorpusRoot::open(root)?;
        tracing::info!("Opening corpus at {}", root.path().display());
        let source = Arc::new(FsSource::new(root));
        Self::new(LinkIndex::with_config(config), source, config)
    }

    pub fn index(&self) -> Arc<RwLock<LinkIndex>> {
        Arc::clone(&self.index)
    }

    pub fn syntax(&self) -> LinkSyntax {
        self.syntax
    }

    pub fn is_included(&self, path: &DocPath) -> bool {
        self.rules.is_included(path)
    }

    fn document_update(&self, path: &DocPath, text: &str) -> DocumentUpdate {
        let update = DocumentUpdate::new(path.clone(), extract_targets(text, self.syntax, path));
        match self.source.location(path) {
            Some(location) => update.with_location(location),
            None => update,
        }
    }

    /// Read `path` and re-link it. Excluded paths are removed instead.
    ///
    /// Unreadable documents are skipped: no mutation, no event.
    pub async fn upsert(&self, path: &DocPath) -> Option<IndexEvent> {
        let _gate = self.gate.read().await;
        if !self.rules.is_included(path) {
            return self.index.write().await.remove(path);
        }

        let text = match self.source.read_text(path).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::debug!("{} vanished before it could be read", path);
                return None;
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable document {}: {}", path, e);
                return None;
            }
        };

        let update = self.document_update(path, &text);
        let mut index = self.index.write().await;
        Some(index.upsert(update))
    }

    pub async fn remove(&self, path: &DocPath) -> Option<IndexEvent> {
        let _gate = self.gate.read().await;
        self.index.write().await.remove(path)
    }

    /// Tracked documents inside the directory `dir`.
    pub async fn tracked_under(&self, dir: &DocPath) -> Vec<DocPath> {
        self.index.read().await.documents_under(dir).cloned().collect()
    }

    /// Eligible documents the source currently lists inside `dir`.
    pub async fn documents_under(&self, dir: &DocPath) -> Vec<DocPath> {
        match self.source.list_documents(&self.rules).await {
            Ok(paths) => paths.into_iter().filter(|path| path.is_under(dir)).collect(),
            Err(e) => {
                tracing::warn!("Could not list documents under {}: {}", dir, e);
                Vec::new()
            }
        }
    }

    /// Re-read every eligible document and replace the index contents.
    ///
    /// Upserts and removals arriving meanwhile are applied after the populate.
    pub async fn rebuild(&self) -> Result<IndexEvent, SourceError> {
        let _gate = self.gate.write().await;
        let paths = self.source.list_documents(&self.rules).await?;
        let mut updates = Vec::with_capacity(paths.len());
        for path in paths {
            match self.source.read_text(&path).await {
                Ok(Some(text)) => updates.push(self.document_update(&path, &text)),
                Ok(None) => tracing::debug!("{} vanished during scan", path),
                Err(e) => tracing::warn!("Skipping unreadable document {}: {}", path, e),
            }
        }

        let mut index = self.index.write().await;
        Ok(index.populate(updates))
    }
}

#[async_trait]
impl IndexSink for Indexer {
    async fn upsert(&self, path: &DocPath) -> Option<IndexEvent> {
        Indexer::upsert(self, path).await
    }

    async fn remove(&self, path: &DocPath) -> Option<IndexEvent> {
        Indexer::remove(self, path).await
    }

    async fn tracked_under(&self, dir: &DocPath) -> Vec<DocPath> {
        Indexer::tracked_under(self, dir).await
    }

    async fn documents_under(&self, dir: &DocPath) -> Vec<DocPath> {
        Indexer::documents_under(self, dir).await
    }
}
