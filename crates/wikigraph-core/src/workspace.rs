//! Corpus root handling

use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::model::DocPath;

/// The directory every document path is relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRoot {
    root: PathBuf,
}

impl CorpusRoot {
    /// Fails with `CorpusRootUnavailable` when `root` is not an existing directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|_| IndexError::CorpusRootUnavailable(root.to_path_buf()))?;
        if !root.is_dir() {
            return Err(IndexError::CorpusRootUnavailable(root));
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Corpus path for a filesystem path below the root.
    pub fn doc_path(&self, path: &Path) -> Option<DocPath> {
        DocPath::from_fs_path(&self.root, path)
    }

    pub fn location(&self, path: &DocPath) -> PathBuf {
        path.to_fs_path(&self.root)
    }
}
