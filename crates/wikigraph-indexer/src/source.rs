//! Where document text comes from
//!
//! `FsSource` walks a corpus directory; `MemorySource` holds documents in
//! memory for tests and embedding.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use ignore::WalkBuilder;
use wikigraph_core::{CorpusRoot, DocPath, InclusionRules};

use crate::error::SourceError;

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Every document matching `rules`, sorted.
    async fn list_documents(&self, rules: &InclusionRules) -> Result<Vec<DocPath>, SourceError>;

    /// Current text of `path`, or `None` when it no longer exists.
    async fn read_text(&self, path: &DocPath) -> Result<Option<String>, SourceError>;

    /// Filesystem location, if the source is backed by files.
    fn location(&self, path: &DocPath) -> Option<PathBuf>;
}

/// Documents stored as files below a corpus root.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: CorpusRoot,
}

impl FsSource {
    pub fn new(root: CorpusRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &CorpusRoot {
        &self.root
    }
}

#[async_trait]
impl DocumentSource for FsSource {
    async fn list_documents(&self, rules: &InclusionRules) -> Result<Vec<DocPath>, SourceError> {
        let root = self.root.clone();
        let rules = rules.clone();
        tokio::task::spawn_blocking(move || walk(&root, &rules)).await?
    }

    async fn read_text(&self, path: &DocPath) -> Result<Option<String>, SourceError> {
        let location = self.root.location(path);
        match tokio::fs::read_to_string(&location).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SourceError::Io {
                path: location,
                source,
            }),
        }
    }

    fn location(&self, path: &DocPath) -> Option<PathBuf> {
        Some(self.root.location(path))
    }
}

fn walk(root: &CorpusRoot, rules: &InclusionRules) -> Result<Vec<DocPath>, SourceError> {
    let mut documents = Vec::new();
    let walker = WalkBuilder::new(root.path())
        .hidden(false)
        .git_ignore(true)
        .require_git(false)
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == Some(0) => return Err(SourceError::Walk(e)),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Some(path) = root.doc_path(entry.path()) else {
            continue;
        };
        if rules.is_included(&path) {
            documents.push(path);
        }
    }

    documents.sort();
    tracing::debug!("Found {} documents under {}", documents.len(), root.path().display());
    Ok(documents)
}

/// In-memory documents keyed by path.
#[derive(Debug, Default)]
pub struct MemorySource {
    documents: RwLock<BTreeMap<DocPath, String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I, P, T>(documents: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: AsRef<str>,
        T: Into<String>,
    {
        let source = Self::new();
        for (path, text) in documents {
            source.insert(DocPath::new(path), text);
        }
        source
    }

    pub fn insert(&self, path: DocPath, text: impl Into<String>) {
        self.documents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path, text.into());
    }

    pub fn delete(&self, path: &DocPath) -> bool {
        self.documents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path)
            .is_some()
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn list_documents(&self, rules: &InclusionRules) -> Result<Vec<DocPath>, SourceError> {
        let documents = self.documents.read().unwrap_or_else(|e| e.into_inner());
        Ok(documents
            .keys()
            .filter(|path| rules.is_included(path))
            .cloned()
            .collect())
    }

    async fn read_text(&self, path: &DocPath) -> Result<Option<String>, SourceError> {
        let documents = self.documents.read().unwrap_or_else(|e| e.into_inner());
        Ok(documents.get(path).cloned())
    }

    fn location(&self, _path: &DocPath) -> Option<PathBuf> {
        None
    }
}
