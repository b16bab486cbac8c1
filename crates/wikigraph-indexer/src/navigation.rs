//! Editor-style helpers over the index: clickable links and link completion

use std::ops::Range;

use wikigraph_core::{DocPath, LinkIndex, LinkSyntax, Resolution};

use crate::link_parser::{LinkKind, extract_links};

/// A link in a document together with where it leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    pub span: Range<usize>,
    pub kind: LinkKind,
    pub target: String,
    pub resolution: Resolution,
}

impl DocumentLink {
    /// The document to open, when the target resolves to exactly one.
    pub fn destination(&self) -> Option<&DocPath> {
        self.resolution.found()
    }
}

/// Every link in `text` (the content of `source`), resolved against `index`.
pub fn document_links(
    index: &LinkIndex,
    source: &DocPath,
    text: &str,
    syntax: LinkSyntax,
) -> Vec<DocumentLink> {
    extract_links(text, syntax)
        .into_iter()
        .map(|link| {
            let resolution = index.resolve(&link.index_target(source));
            DocumentLink {
                span: link.span,
                kind: link.kind,
                target: link.target,
                resolution,
            }
        })
        .collect()
}

/// How well a completion candidate matches the typed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchRank {
    Exact,
    Prefix,
    Contains,
    /// Matched on the directory part of the path only.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    pub path: DocPath,
    pub label: String,
    pub rank: MatchRank,
    /// Text for `[[...]]`.
    pub wiki_insert: String,
    /// Text for `[...](...)`.
    pub markdown_insert: String,
}

/// Tracked documents whose name or path contains `input`, best matches first.
pub fn complete(index: &LinkIndex, input: &str) -> Vec<CompletionItem> {
    let needle = input.trim().to_lowercase();

    let mut items: Vec<CompletionItem> = index
        .documents()
        .filter_map(|path| {
            let label = path.stem().to_string();
            let name = label.to_lowercase();
            let rank = if name == needle {
                MatchRank::Exact
            } else if name.starts_with(&needle) {
                MatchRank::Prefix
            } else if name.contains(&needle) {
                MatchRank::Contains
            } else if path.as_str().to_lowercase().contains(&needle) {
                MatchRank::Other
            } else {
                return None;
            };
            Some(CompletionItem {
                path: path.clone(),
                wiki_insert: label.clone(),
                markdown_insert: path.to_string(),
                label,
                rank,
            })
        })
        .collect();

    items.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
            .then_with(|| a.path.cmp(&b.path))
    });
    items
}
