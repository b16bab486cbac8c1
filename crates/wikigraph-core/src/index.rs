//! Link graph index: forward links, back-links and the name index
//!
//! The index is a single-writer structure. Every mutation (`upsert`,
//! `remove`, `populate`) is synchronous and leaves the three maps consistent
//! before observers are notified, so views derived inside an observer
//! callback always see a settled state.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::{AmbiguityPolicy, WorkspaceConfig};
use crate::model::{DocPath, DocumentUpdate, ForwardLink, IndexEvent, IndexStats, LinkTarget};
use crate::observer::{ChannelObserver, IndexObserver, ObserverList, SubscriptionId};
use crate::resolver::{NameIndex, NameResolver, Resolution};

#[derive(Debug, Clone)]
struct TrackedDocument {
    location: Option<PathBuf>,
    /// Targets as extracted, kept so links can be re-resolved when names change.
    targets: Vec<String>,
    links: Vec<ForwardLink>,
}

pub struct LinkIndex {
    /// Keys are exactly the tracked documents.
    documents: BTreeMap<DocPath, TrackedDocument>,
    /// Target -> sorted sources with a resolved link to it. Targets may be virtual.
    back_links: BTreeMap<DocPath, Vec<DocPath>>,
    names: NameIndex,
    default_extension: String,
    ambiguity: AmbiguityPolicy,
    observers: ObserverList,
}

impl std::fmt::Debug for LinkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkIndex")
            .field("documents", &self.documents.len())
            .field("back_link_targets", &self.back_links.len())
            .field("names", &self.names.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl LinkIndex {
    pub fn new() -> Self {
        LinkIndex {
            documents: BTreeMap::new(),
            back_links: BTreeMap::new(),
            names: NameIndex::new(),
            default_extension: "md".to_string(),
            ambiguity: AmbiguityPolicy::default(),
            observers: ObserverList::default(),
        }
    }

    pub fn with_config(config: &WorkspaceConfig) -> Self {
        LinkIndex {
            default_extension: config.default_extension.clone(),
            ambiguity: config.ambiguity,
            ..Self::new()
        }
    }

    // ── Mutations ───────────────────────────────────────────

    /// Track or re-link a document from freshly extracted targets.
    ///
    /// Emits `Added` for a previously untracked path and `Updated` otherwise.
    pub fn upsert(&mut self, update: DocumentUpdate) -> IndexEvent {
        let DocumentUpdate {
            path,
            location,
            targets,
        } = update;

        let previous = self.documents.remove(&path);
        let is_new = previous.is_none();
        if let Some(previous) = &previous {
            self.detach(&path, &previous.links);
        }

        // Registered first so a document linking to itself resolves.
        self.names.insert(&path);

        let links = self.link_targets(&path, &targets);
        self.attach(&path, &links);
        tracing::debug!(
            "Indexed {} ({} links, {} unresolved)",
            path,
            links.len(),
            links.iter().filter(|l| l.not_exist()).count()
        );
        self.documents.insert(
            path.clone(),
            TrackedDocument {
                location,
                targets,
                links,
            },
        );

        if is_new {
            let mentioning = self.mentioning(path.file_name(), Some(&path));
            let repaired = self.relink(mentioning);
            if repaired > 0 {
                tracing::debug!("Re-linked {} documents after adding {}", repaired, path);
            }
        }

        let event = if is_new {
            IndexEvent::Added { path }
        } else {
            IndexEvent::Updated { path }
        };
        self.observers.notify(&event, self);
        event
    }

    /// Stop tracking a document. Returns `None` when the path was not tracked.
    pub fn remove(&mut self, path: &DocPath) -> Option<IndexEvent> {
        let Some(removed) = self.documents.remove(path) else {
            tracing::debug!("Ignoring removal of untracked {}", path);
            return None;
        };

        self.detach(path, &removed.links);
        self.names.remove(path);

        // Sources pointing here either fall back to another candidate,
        // become unresolved, or keep an absolute link to the now virtual path.
        let mut affected: BTreeSet<DocPath> = self
            .back_links
            .remove(path)
            .unwrap_or_default()
            .into_iter()
            .collect();
        affected.extend(self.mentioning(path.file_name(), None));
        self.relink(affected);

        tracing::debug!("Removed {}", path);
        let event = IndexEvent::Deleted { path: path.clone() };
        self.observers.notify(&event, self);
        Some(event)
    }

    /// Replace the whole index with `updates`, emitting a single `Ready` event.
    pub fn populate(&mut self, updates: Vec<DocumentUpdate>) -> IndexEvent {
        self.documents.clear();
        self.back_links.clear();
        self.names.clear();

        for update in &updates {
            self.names.insert(&update.path);
        }
        for update in updates {
            let links = self.link_targets(&update.path, &update.targets);
            if let Some(previous) = self.documents.remove(&update.path) {
                self.detach(&update.path, &previous.links);
            }
            self.attach(&update.path, &links);
            self.documents.insert(
                update.path,
                TrackedDocument {
                    location: update.location,
                    targets: update.targets,
                    links,
                },
            );
        }

        tracing::info!(
            "Index populated: {} documents, {} link targets",
            self.documents.len(),
            self.back_links.len()
        );
        let event = IndexEvent::Ready {
            documents: self.documents.len(),
        };
        self.observers.notify(&event, self);
        event
    }

    fn link_targets(&self, source: &DocPath, targets: &[String]) -> Vec<ForwardLink> {
        let mut seen = HashSet::new();
        let mut links = Vec::with_capacity(targets.len());
        for raw in targets {
            let target = self.resolve_for(source, raw);
            if seen.insert(target.id().to_string()) {
                links.push(ForwardLink {
                    raw: raw.clone(),
                    target,
                });
            }
        }
        links
    }

    fn attach(&mut self, source: &DocPath, links: &[ForwardLink]) {
        for target in links.iter().filter_map(ForwardLink::resolved) {
            let sources = self.back_links.entry(target.clone()).or_default();
            if let Err(pos) = sources.binary_search(source) {
                sources.insert(pos, source.clone());
            }
        }
    }

    fn detach(&mut self, source: &DocPath, links: &[ForwardLink]) {
        for target in links.iter().filter_map(ForwardLink::resolved) {
            if let Some(sources) = self.back_links.get_mut(target) {
                sources.retain(|s| s != source);
                if sources.is_empty() {
                    self.back_links.remove(target);
                }
            }
        }
    }

    /// Tracked documents with a link target whose basename could name `file_name`.
    fn mentioning(&self, file_name: &str, skip: Option<&DocPath>) -> BTreeSet<DocPath> {
        let stem = file_name
            .strip_suffix(self.default_extension.as_str())
            .and_then(|s| s.strip_suffix('.'));
        self.documents
            .iter()
            .filter(|(path, _)| Some(*path) != skip)
            .filter(|(_, doc)| {
                doc.targets.iter().any(|raw| {
                    let base = raw.trim().rsplit('/').next().unwrap_or_default();
                    base == file_name || Some(base) == stem
                })
            })
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Re-resolve the links of `sources`. Returns how many changed.
    fn relink(&mut self, sources: BTreeSet<DocPath>) -> usize {
        let mut changed = 0;
        for source in sources {
            let Some(doc) = self.documents.get(&source) else {
                continue;
            };
            let old = doc.links.clone();
            let links = self.link_targets(&source, &doc.targets);
            self.detach(&source, &old);
            self.attach(&source, &links);
            if links != old {
                changed += 1;
            }
            if let Some(doc) = self.documents.get_mut(&source) {
                doc.links = links;
            }
        }
        changed
    }

    // ── Reads ───────────────────────────────────────────────

    pub fn is_tracked(&self, path: &DocPath) -> bool {
        self.documents.contains_key(path)
    }

    /// Tracked, or the target of at least one resolved link.
    pub fn has_record(&self, path: &DocPath) -> bool {
        self.documents.contains_key(path) || self.back_links.contains_key(path)
    }

    pub fn forward_links(&self, path: &DocPath) -> Option<&[ForwardLink]> {
        self.documents.get(path).map(|doc| doc.links.as_slice())
    }

    pub fn back_links(&self, path: &DocPath) -> &[DocPath] {
        self.back_links
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Tracked paths in sorted order.
    pub fn documents(&self) -> impl Iterator<Item = &DocPath> {
        self.documents.keys()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn location(&self, path: &DocPath) -> Option<&Path> {
        self.documents
            .get(path)
            .and_then(|doc| doc.location.as_deref())
    }

    /// True when `source` has a resolved forward link to `target`.
    pub fn links_to(&self, source: &DocPath, target: &DocPath) -> bool {
        self.forward_links(source)
            .is_some_and(|links| links.iter().any(|l| l.resolved() == Some(target)))
    }

    pub fn resolve(&self, target: &str) -> Resolution {
        NameResolver::new(&self.names, &self.default_extension).resolve(target)
    }

    /// Resolve `target` as written in `source`, settling ambiguity with the configured policy.
    pub fn resolve_for(&self, source: &DocPath, target: &str) -> LinkTarget {
        match self.resolve(target) {
            Resolution::Found(path) => LinkTarget::Resolved(path),
            Resolution::Ambiguous(candidates) => {
                match self.ambiguity.choose(source, &candidates) {
                    Some(path) => LinkTarget::Resolved(path),
                    None => LinkTarget::Unresolved(target.trim().to_string()),
                }
            }
            Resolution::Unresolved => LinkTarget::Unresolved(target.trim().to_string()),
        }
    }

    /// Find the document a view request refers to: an exact path with a
    /// record, or a name that resolves to one.
    pub fn locate(&self, requested: &str) -> Option<DocPath> {
        let exact = DocPath::new(requested);
        if self.has_record(&exact) {
            return Some(exact);
        }
        let found = match self.resolve(requested) {
            Resolution::Found(path) => path,
            Resolution::Ambiguous(candidates) => candidates.into_iter().next()?,
            Resolution::Unresolved => return None,
        };
        self.has_record(&found).then_some(found)
    }

    /// Tracked documents whose link to `name` did not resolve.
    pub fn unresolved_sources(&self, name: &str) -> Vec<DocPath> {
        let name = name.trim();
        self.documents
            .iter()
            .filter(|(_, doc)| {
                doc.links
                    .iter()
                    .any(|l| matches!(&l.target, LinkTarget::Unresolved(n) if n == name))
            })
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Tracked documents strictly inside the directory `dir`.
    pub fn documents_under<'a>(&'a self, dir: &'a DocPath) -> impl Iterator<Item = &'a DocPath> + 'a {
        self.documents.keys().filter(move |path| path.is_under(dir))
    }

    /// Basenames shared by several tracked documents.
    pub fn ambiguous_names(&self) -> Vec<(String, Vec<DocPath>)> {
        self.names.ambiguous()
    }

    /// Unresolved link targets per source document.
    pub fn dangling_links(&self) -> Vec<(DocPath, Vec<String>)> {
        self.documents
            .iter()
            .filter_map(|(path, doc)| {
                let missing: Vec<String> = doc
                    .links
                    .iter()
                    .filter(|l| l.not_exist())
                    .map(|l| l.target.id().to_string())
                    .collect();
                (!missing.is_empty()).then(|| (path.clone(), missing))
            })
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        let mut virtual_targets = HashSet::new();
        let mut links = 0;
        let mut unresolved_links = 0;
        for doc in self.documents.values() {
            for link in &doc.links {
                links += 1;
                match &link.target {
                    LinkTarget::Resolved(path) if self.documents.contains_key(path) => {}
                    LinkTarget::Resolved(path) => {
                        virtual_targets.insert(path.as_str());
                    }
                    LinkTarget::Unresolved(name) => {
                        unresolved_links += 1;
                        virtual_targets.insert(name.as_str());
                    }
                }
            }
        }
        IndexStats {
            tracked: self.documents.len(),
            virtual_targets: virtual_targets.len(),
            links,
            unresolved_links,
            ambiguous_names: self.names.ambiguous().len(),
        }
    }

    // ── Subscriptions ───────────────────────────────────────

    pub fn subscribe(&mut self, observer: Arc<dyn IndexObserver>) -> SubscriptionId {
        self.observers.add(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.remove(id)
    }

    /// Receive every event on a broadcast channel of the given capacity.
    pub fn subscribe_channel(&mut self, capacity: usize) -> broadcast::Receiver<IndexEvent> {
        let (tx, rx) = broadcast::channel(capacity);
        self.observers.add(Arc::new(ChannelObserver::new(tx)));
        rx
    }

    /// Release every observer; called at session end.
    pub fn close(&mut self) {
        self.observers.clear();
    }
}

impl Default for LinkIndex {
    fn default() -> Self {
        Self::new()
    }
}
