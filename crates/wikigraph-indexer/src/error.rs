//! Errors raised while enumerating or reading documents.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk corpus: {0}")]
    Walk(#[from] ignore::Error),

    #[error("corpus walk task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Index(#[from] wikigraph_core::IndexError),
}
