//! Document scanning, corpus enumeration and index maintenance

pub mod error;
pub mod link_parser;
pub mod source;
pub mod indexer;
pub mod navigation;


#[cfg(test)]
pub mod test_utils;

pub use error::SourceError;
pub use link_parser::{LinkKind, LinkOccurrence, extract_links, extract_targets};
pub use source::{DocumentSource, FsSource, MemorySource};
pub use indexer::{IndexSink, Indexer};
pub use navigation::{CompletionItem, DocumentLink, MatchRank, complete, document_links};
