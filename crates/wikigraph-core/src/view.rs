//! Graph views derived from the link index
//!
//! Views are plain snapshots: building one only reads the index, and the
//! result owns its nodes and relationships.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::index::LinkIndex;
use crate::model::{DocPath, Document, LinkTarget};

/// Which link directions contribute relationships to a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOption {
    pub forward_links: bool,
    pub backward_links: bool,
}

impl Default for GraphOption {
    fn default() -> Self {
        Self {
            forward_links: true,
            backward_links: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkCategory {
    Forward,
    Backward,
    Bidirectional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRelationship {
    pub start: String,
    pub end: String,
    pub category: LinkCategory,
    /// Contributed by walking back-links rather than forward links.
    pub is_backlink: bool,
}

impl ViewRelationship {
    pub fn id(&self) -> String {
        format!("{}{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<Document>,
    pub relationships: Vec<ViewRelationship>,
}

impl GraphView {
    pub fn node(&self, id: &str) -> Option<&Document> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn relationship(&self, start: &str, end: &str) -> Option<&ViewRelationship> {
        self.relationships
            .iter()
            .find(|r| r.start == start && r.end == end)
    }
}

/// Accumulates nodes and relationships, deduplicating both by id.
struct ViewBuilder<'a> {
    index: &'a LinkIndex,
    view: GraphView,
    node_ids: HashSet<String>,
    edge_ids: HashSet<(String, String)>,
}

impl<'a> ViewBuilder<'a> {
    fn new(index: &'a LinkIndex) -> Self {
        Self {
            index,
            view: GraphView::default(),
            node_ids: HashSet::new(),
            edge_ids: HashSet::new(),
        }
    }

    fn add_path(&mut self, path: &DocPath) {
        if !self.node_ids.insert(path.as_str().to_string()) {
            return;
        }
        let node = if self.index.is_tracked(path) {
            Document::Tracked {
                path: path.clone(),
                location: self.index.location(path).map(Into::into),
            }
        } else {
            Document::Virtual {
                id: path.as_str().to_string(),
            }
        };
        self.view.nodes.push(node);
    }

    fn add_target(&mut self, target: &LinkTarget) {
        match target {
            LinkTarget::Resolved(path) => self.add_path(path),
            LinkTarget::Unresolved(name) => {
                if self.node_ids.insert(name.clone()) {
                    self.view.nodes.push(Document::Virtual { id: name.clone() });
                }
            }
        }
    }

    fn add_relationship(&mut self, start: &str, end: &str, category: LinkCategory, is_backlink: bool) {
        if !self.edge_ids.insert((start.to_string(), end.to_string())) {
            return;
        }
        self.view.relationships.push(ViewRelationship {
            start: start.to_string(),
            end: end.to_string(),
            category,
            is_backlink,
        });
    }

    /// Forward, or bidirectional when `target` links back to `source`.
    fn classify(&self, source: &DocPath, target: &LinkTarget, default: LinkCategory) -> LinkCategory {
        match target {
            LinkTarget::Resolved(path) if self.index.links_to(path, source) => {
                LinkCategory::Bidirectional
            }
            _ => default,
        }
    }

    fn finish(self) -> GraphView {
        self.view
    }
}

/// Whole-corpus view: every tracked document plus every link target.
pub fn global_view(index: &LinkIndex, option: GraphOption) -> GraphView {
    let mut builder = ViewBuilder::new(index);

    for path in index.documents() {
        builder.add_path(path);
    }

    for source in index.documents() {
        for link in index.forward_links(source).unwrap_or_default() {
            builder.add_target(&link.target);
            if option.forward_links {
                let category = builder.classify(source, &link.target, LinkCategory::Forward);
                builder.add_relationship(source.as_str(), link.target.id(), category, false);
            }
        }
    }

    if option.backward_links {
        for source in index.documents() {
            for link in index.forward_links(source).unwrap_or_default() {
                let Some(target) = link.resolved() else {
                    continue;
                };
                if !index.back_links(target).contains(source) {
                    continue;
                }
                let category = builder.classify(source, &link.target, LinkCategory::Backward);
                builder.add_relationship(source.as_str(), target.as_str(), category, true);
            }
        }
    }

    builder.finish()
}

/// Neighborhood of one document: its forward links and its back-links.
///
/// `requested` may be an exact path, a link-style name, or the id of a
/// virtual node left by unresolved links. `GraphOption` only decides which
/// relationships are drawn; neighbor nodes are always included. Fails with
/// `DocumentNotTracked` when the index has no record of `requested`.
pub fn local_view(index: &LinkIndex, requested: &str, option: GraphOption) -> Result<GraphView> {
    let Some(start) = index.locate(requested) else {
        return unresolved_local_view(index, requested, option);
    };

    let mut builder = ViewBuilder::new(index);
    builder.add_path(&start);

    for link in index.forward_links(&start).unwrap_or_default() {
        builder.add_target(&link.target);
        if option.forward_links {
            let category = builder.classify(&start, &link.target, LinkCategory::Forward);
            builder.add_relationship(start.as_str(), link.target.id(), category, false);
        }
    }

    let target = LinkTarget::Resolved(start.clone());
    for source in index.back_links(&start) {
        builder.add_path(source);
        if option.backward_links {
            let category = builder.classify(source, &target, LinkCategory::Backward);
            builder.add_relationship(source.as_str(), start.as_str(), category, true);
        }
    }

    Ok(builder.finish())
}

/// Neighborhood of a virtual node created by unresolved links: the
/// documents holding such a link.
fn unresolved_local_view(index: &LinkIndex, name: &str, option: GraphOption) -> Result<GraphView> {
    let sources = index.unresolved_sources(name);
    if sources.is_empty() {
        return Err(IndexError::DocumentNotTracked(name.to_string()));
    }

    let start = LinkTarget::Unresolved(name.trim().to_string());
    let mut builder = ViewBuilder::new(index);
    builder.add_target(&start);
    for source in &sources {
        builder.add_path(source);
        if option.backward_links {
            builder.add_relationship(source.as_str(), start.id(), LinkCategory::Backward, true);
        }
    }
    Ok(builder.finish())
}

/// Narrow a view to nodes matching `query`.
///
/// `filename:<text>` and bare text match the node's file name, `path:<text>`
/// its full id. Matching is a case-sensitive substring test. Relationships
/// survive only when both endpoints do; an empty query keeps everything.
pub fn apply_search_filter(view: &GraphView, query: &str) -> GraphView {
    let query = query.trim();
    if query.is_empty() {
        return view.clone();
    }

    let is_match: Box<dyn Fn(&Document) -> bool> = if let Some(text) = query.strip_prefix("path:") {
        let text = text.trim().to_string();
        Box::new(move |node| node.id().contains(text.as_str()))
    } else {
        let text = query
            .strip_prefix("filename:")
            .unwrap_or(query)
            .trim()
            .to_string();
        Box::new(move |node| node.file_name().contains(text.as_str()))
    };

    let nodes: Vec<Document> = view.nodes.iter().filter(|node| is_match(*node)).cloned().collect();
    let kept: HashSet<&str> = nodes.iter().map(Document::id).collect();
    let relationships = view
        .relationships
        .iter()
        .filter(|r| kept.contains(r.start.as_str()) && kept.contains(r.end.as_str()))
        .cloned()
        .collect();

    GraphView {
        nodes,
        relationships,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentUpdate;

    fn index(docs: &[(&str, &[&str])]) -> LinkIndex {
        let mut index = LinkIndex::new();
        index.populate(
            docs.iter()
                .map(|(path, targets)| {
                    DocumentUpdate::new(
                        DocPath::new(path),
                        targets.iter().map(|t| t.to_string()).collect(),
                    )
                })
                .collect(),
        );
        index
    }

    #[test]
    fn test_mutual_links_are_bidirectional() {
        let index = index(&[("/A.md", &["B"]), ("/B.md", &["A"])]);
        let view = global_view(&index, GraphOption::default());

        assert_eq!(view.nodes.len(), 2);
        assert_eq!(view.relationships.len(), 2);
        assert!(view
            .relationships
            .iter()
            .all(|r| r.category == LinkCategory::Bidirectional));
    }

    #[test]
    fn test_backward_only_still_creates_target_nodes() {
        let index = index(&[("/A.md", &["B", "Ghost"]), ("/B.md", &[])]);
        let option = GraphOption {
            forward_links: false,
            backward_links: true,
        };
        let view = global_view(&index, option);

        assert_eq!(view.nodes.len(), 3);
        assert!(view.node("Ghost").is_some_and(Document::is_virtual));
        // Unresolved links never produce back-links.
        assert_eq!(view.relationships.len(), 1);
        let rel = view.relationship("/A.md", "/B.md").unwrap();
        assert_eq!(rel.category, LinkCategory::Backward);
        assert!(rel.is_backlink);
    }

    #[test]
    fn test_no_directions_gives_nodes_only() {
        let index = index(&[("/A.md", &["B"]), ("/B.md", &[])]);
        let option = GraphOption {
            forward_links: false,
            backward_links: false,
        };
        let view = global_view(&index, option);
        assert_eq!(view.nodes.len(), 2);
        assert!(view.relationships.is_empty());
    }

    #[test]
    fn test_local_view_collects_both_directions() {
        let index = index(&[
            ("/A.md", &["B"]),
            ("/B.md", &["C"]),
            ("/C.md", &[]),
            ("/D.md", &["A"]),
        ]);
        let view = local_view(&index, "/B.md", GraphOption::default()).unwrap();

        let mut ids: Vec<&str> = view.nodes.iter().map(Document::id).collect();
        ids.sort();
        assert_eq!(ids, vec!["/A.md", "/B.md", "/C.md"]);
        assert_eq!(view.relationships.len(), 2);
        assert!(view.relationship("/A.md", "/B.md").unwrap().is_backlink);
        assert!(!view.relationship("/B.md", "/C.md").unwrap().is_backlink);
    }

    #[test]
    fn test_local_view_accepts_link_names() {
        let index = index(&[("/notes/A.md", &[])]);
        let view = local_view(&index, "A", GraphOption::default()).unwrap();
        assert_eq!(view.nodes.len(), 1);
        assert_eq!(view.nodes[0].id(), "/notes/A.md");
    }

    #[test]
    fn test_local_view_of_virtual_target() {
        let index = index(&[("/A.md", &["/elsewhere/Ghost.md"])]);
        let view = local_view(&index, "/elsewhere/Ghost.md", GraphOption::default()).unwrap();
        assert!(view.node("/elsewhere/Ghost.md").is_some_and(Document::is_virtual));
        assert!(view.relationship("/A.md", "/elsewhere/Ghost.md").is_some());
    }

    #[test]
    fn test_local_view_of_unresolved_name() {
        let index = index(&[("/A.md", &["B"]), ("/B.md", &[]), ("/C.md", &["Missing"])]);
        let view = local_view(&index, "Missing", GraphOption::default()).unwrap();

        let ids: Vec<&str> = view.nodes.iter().map(Document::id).collect();
        assert_eq!(ids, vec!["Missing", "/C.md"]);
        assert!(view.node("Missing").is_some_and(Document::is_virtual));
        let rel = view.relationship("/C.md", "Missing").unwrap();
        assert_eq!(rel.category, LinkCategory::Backward);
        assert!(rel.is_backlink);
        assert_eq!(view.relationships.len(), 1);
    }

    #[test]
    fn test_local_view_keeps_neighbors_when_directions_disabled() {
        let index = index(&[("/A.md", &["B"]), ("/B.md", &["C", "Ghost"]), ("/C.md", &[])]);

        let backward_only = GraphOption {
            forward_links: false,
            backward_links: true,
        };
        let view = local_view(&index, "/B.md", backward_only).unwrap();
        let mut ids: Vec<&str> = view.nodes.iter().map(Document::id).collect();
        ids.sort();
        assert_eq!(ids, vec!["/A.md", "/B.md", "/C.md", "Ghost"]);
        assert_eq!(view.relationships.len(), 1);
        assert!(view.relationship("/A.md", "/B.md").unwrap().is_backlink);

        let forward_only = GraphOption {
            forward_links: true,
            backward_links: false,
        };
        let view = local_view(&index, "/B.md", forward_only).unwrap();
        assert_eq!(view.nodes.len(), 4);
        assert!(view.relationship("/A.md", "/B.md").is_none());
        assert!(view.relationship("/B.md", "/C.md").is_some());
    }

    #[test]
    fn test_local_view_unknown_document_fails() {
        let index = index(&[("/A.md", &[])]);
        let err = local_view(&index, "/Nope.md", GraphOption::default()).unwrap_err();
        assert!(matches!(err, IndexError::DocumentNotTracked(p) if p == "/Nope.md"));
    }

    #[test]
    fn test_search_by_path_prefix() {
        let index = index(&[
            ("/notes/A.md", &["B"]),
            ("/notes/B.md", &[]),
            ("/journal/C.md", &["A"]),
        ]);
        let view = global_view(&index, GraphOption::default());
        let filtered = apply_search_filter(&view, "path:/notes/");

        assert_eq!(filtered.nodes.len(), 2);
        assert_eq!(filtered.relationships.len(), 1);
    }

    #[test]
    fn test_search_is_case_sensitive() {
        let index = index(&[("/Alpha.md", &[])]);
        let view = global_view(&index, GraphOption::default());
        assert!(apply_search_filter(&view, "alpha").nodes.is_empty());
        assert_eq!(apply_search_filter(&view, "Alpha").nodes.len(), 1);
        assert_eq!(apply_search_filter(&view, "  ").nodes.len(), 1);
    }
}
