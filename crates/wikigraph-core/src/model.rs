//! Core data structures for the link graph

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Corpus-relative document path.
///
/// Always rooted at `/` with forward slashes, `.` and `..` segments collapsed.
/// `/notes/Ideas.md` names `<corpus root>/notes/Ideas.md`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocPath(String);

impl DocPath {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();
        for part in raw.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        DocPath(format!("/{}", segments.join("/")))
    }

    /// Build from a filesystem path below `root`. Returns `None` for paths outside it.
    pub fn from_fs_path(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(DocPath(format!("/{}", segments.join("/"))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, e.g. `Ideas.md`.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// File name without its final extension, e.g. `Ideas`.
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        }
    }

    /// Directory portion without the trailing slash; empty for root-level documents.
    pub fn parent(&self) -> &str {
        &self.0[..self.0.rfind('/').unwrap_or(0)]
    }

    /// True when this path lies strictly inside the directory `dir`.
    pub fn is_under(&self, dir: &DocPath) -> bool {
        self.0
            .strip_prefix(dir.as_str())
            .is_some_and(|rest| rest.starts_with('/') || (dir.0 == "/" && !rest.is_empty()))
    }

    /// Resolve `relative` against the directory containing this document.
    ///
    /// `/notes/Source.md` joined with `../Ideas.md` gives `/Ideas.md`.
    pub fn join_relative(&self, relative: &str) -> DocPath {
        DocPath::new(format!("{}/{}", self.parent(), relative))
    }

    /// Filesystem location of this document below `root`.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        root.join(self.0.trim_start_matches('/'))
    }

    /// True when a link target is written as a corpus-absolute path.
    pub fn is_absolute_target(target: &str) -> bool {
        target.starts_with('/')
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where a forward link points after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum LinkTarget {
    /// A concrete corpus path. It may still be untracked (virtual).
    Resolved(DocPath),
    /// No candidate exists; keeps the link text as written.
    Unresolved(String),
}

impl LinkTarget {
    /// Node id used for this target in graph views.
    pub fn id(&self) -> &str {
        match self {
            LinkTarget::Resolved(path) => path.as_str(),
            LinkTarget::Unresolved(name) => name,
        }
    }
}

/// One outbound link of a tracked document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardLink {
    /// Target text as it appeared in the document (anchor and alias stripped).
    pub raw: String,
    pub target: LinkTarget,
}

impl ForwardLink {
    /// Unresolved links are rendered as virtual nodes and never produce back-links.
    pub fn not_exist(&self) -> bool {
        matches!(self.target, LinkTarget::Unresolved(_))
    }

    pub fn resolved(&self) -> Option<&DocPath> {
        match &self.target {
            LinkTarget::Resolved(path) => Some(path),
            LinkTarget::Unresolved(_) => None,
        }
    }
}

/// A graph node: either a scanned document or a link target with no content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Document {
    Tracked {
        path: DocPath,
        location: Option<PathBuf>,
    },
    Virtual {
        id: String,
    },
}

impl Document {
    pub fn id(&self) -> &str {
        match self {
            Document::Tracked { path, .. } => path.as_str(),
            Document::Virtual { id } => id,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Document::Virtual { .. })
    }

    pub fn file_name(&self) -> &str {
        match self {
            Document::Tracked { path, .. } => path.file_name(),
            Document::Virtual { id } => id.rsplit('/').next().unwrap_or(id),
        }
    }

    pub fn location(&self) -> Option<&Path> {
        match self {
            Document::Tracked { location, .. } => location.as_deref(),
            Document::Virtual { .. } => None,
        }
    }
}

/// Input to an index mutation: a document and the link targets found in its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpdate {
    pub path: DocPath,
    pub location: Option<PathBuf>,
    /// Link targets in order of appearance, already made corpus-absolute
    /// when the link syntax is path-relative.
    pub targets: Vec<String>,
}

impl DocumentUpdate {
    pub fn new(path: DocPath, targets: Vec<String>) -> Self {
        DocumentUpdate {
            path,
            location: None,
            targets,
        }
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Notification emitted by the index after each mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexEvent {
    Added { path: DocPath },
    Updated { path: DocPath },
    Deleted { path: DocPath },
    /// Bulk population finished.
    Ready { documents: usize },
}

impl IndexEvent {
    pub fn path(&self) -> Option<&DocPath> {
        match self {
            IndexEvent::Added { path }
            | IndexEvent::Updated { path }
            | IndexEvent::Deleted { path } => Some(path),
            IndexEvent::Ready { .. } => None,
        }
    }
}

/// Counters reported by `check` and the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub tracked: usize,
    pub virtual_targets: usize,
    pub links: usize,
    pub unresolved_links: usize,
    pub ambiguous_names: usize,
}
