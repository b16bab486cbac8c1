//! Error types for the link index and its configuration.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    /// A local view was requested for a document the index has no record of.
    #[error("document not tracked: {0}")]
    DocumentNotTracked(String),

    /// The corpus root is missing or not a directory.
    #[error("corpus root unavailable: {}", .0.display())]
    CorpusRootUnavailable(PathBuf),

    #[error("invalid configuration in {origin}: {source}")]
    Config {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid glob pattern `{pattern}`: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
