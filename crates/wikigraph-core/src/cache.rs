//! Cached global view, kept current by subscribing to index events

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::index::LinkIndex;
use crate::model::IndexEvent;
use crate::observer::IndexObserver;
use crate::view::{GraphOption, GraphView, global_view};

/// A built view plus when and why it was built.
#[derive(Debug, Clone)]
pub struct CachedView {
    pub view: GraphView,
    pub option: GraphOption,
    pub built_at: DateTime<Utc>,
    /// Number of rebuilds up to and including this one.
    pub sequence: u64,
}

/// Rebuilds the global view on every index event.
///
/// Register with `LinkIndex::subscribe`; readers get the latest snapshot via
/// [`ViewCache::current`] without touching the index.
#[derive(Debug)]
pub struct ViewCache {
    option: RwLock<GraphOption>,
    current: RwLock<Option<Arc<CachedView>>>,
    rebuilds: AtomicU64,
}

impl ViewCache {
    pub fn new(option: GraphOption) -> Self {
        Self {
            option: RwLock::new(option),
            current: RwLock::new(None),
            rebuilds: AtomicU64::new(0),
        }
    }

    pub fn option(&self) -> GraphOption {
        *self.option.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Change the option and rebuild immediately from `index`.
    pub fn set_option(&self, option: GraphOption, index: &LinkIndex) {
        *self.option.write().unwrap_or_else(|e| e.into_inner()) = option;
        self.rebuild(index);
    }

    pub fn current(&self) -> Option<Arc<CachedView>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::SeqCst)
    }

    pub fn rebuild(&self, index: &LinkIndex) -> Arc<CachedView> {
        let option = self.option();
        let sequence = self.rebuilds.fetch_add(1, Ordering::SeqCst) + 1;
        let cached = Arc::new(CachedView {
            view: global_view(index, option),
            option,
            built_at: Utc::now(),
            sequence,
        });
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&cached));
        cached
    }
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(GraphOption::default())
    }
}

impl IndexObserver for ViewCache {
    fn on_event(&self, event: &IndexEvent, index: &LinkIndex) {
        let cached = self.rebuild(index);
        tracing::debug!(
            "View rebuilt after {:?} (#{}, {} nodes)",
            event,
            cached.sequence,
            cached.view.nodes.len()
        );
    }
}
