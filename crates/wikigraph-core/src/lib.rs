//! Wikigraph Core: Link graph index, name resolution, views and wire export

pub mod config;
pub mod error;
pub mod model;
pub mod resolver;
pub mod index;
pub mod observer;
pub mod view;
pub mod export;
pub mod cache;
pub mod workspace;


pub use config::{AmbiguityPolicy, CONFIG_FILE, InclusionRules, LinkSyntax, ServerSection, WorkspaceConfig};
pub use error::{IndexError, Result};
pub use model::{DocPath, Document, DocumentUpdate, ForwardLink, IndexEvent, IndexStats, LinkTarget};
pub use resolver::{NameIndex, NameResolver, Resolution};
pub use index::LinkIndex;
pub use observer::{ChannelObserver, IndexObserver, SubscriptionId};
pub use view::{GraphOption, GraphView, LinkCategory, ViewRelationship, apply_search_filter, global_view, local_view};
pub use export::GraphExport;
pub use cache::{CachedView, ViewCache};
pub use workspace::CorpusRoot;
