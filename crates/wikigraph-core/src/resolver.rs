//! Name index and link target resolution

use std::collections::{BTreeSet, HashMap};

use crate::config::AmbiguityPolicy;
use crate::model::DocPath;

/// Outcome of resolving a link target against the tracked documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(DocPath),
    /// Several tracked documents share the name; sorted by path.
    Ambiguous(Vec<DocPath>),
    Unresolved,
}

impl Resolution {
    pub fn found(&self) -> Option<&DocPath> {
        match self {
            Resolution::Found(path) => Some(path),
            _ => None,
        }
    }
}

/// Basename -> tracked paths carrying that basename.
#[derive(Debug, Default, Clone)]
pub struct NameIndex {
    by_name: HashMap<String, BTreeSet<DocPath>>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &DocPath) {
        self.by_name
            .entry(path.file_name().to_string())
            .or_default()
            .insert(path.clone());
    }

    /// Returns true if the path was present.
    pub fn remove(&mut self, path: &DocPath) -> bool {
        let name = path.file_name();
        let Some(paths) = self.by_name.get_mut(name) else {
            return false;
        };
        let removed = paths.remove(path);
        if paths.is_empty() {
            self.by_name.remove(name);
        }
        removed
    }

    pub fn contains(&self, path: &DocPath) -> bool {
        self.by_name
            .get(path.file_name())
            .is_some_and(|paths| paths.contains(path))
    }

    pub fn candidates(&self, name: &str) -> Option<&BTreeSet<DocPath>> {
        self.by_name.get(name)
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
    }

    /// Number of distinct basenames.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Basenames shared by more than one tracked document, sorted by name.
    pub fn ambiguous(&self) -> Vec<(String, Vec<DocPath>)> {
        let mut shared: Vec<(String, Vec<DocPath>)> = self
            .by_name
            .iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(name, paths)| (name.clone(), paths.iter().cloned().collect()))
            .collect();
        shared.sort_by(|a, b| a.0.cmp(&b.0));
        shared
    }
}

/// Resolves bare link targets to tracked documents. Pure over the name index.
pub struct NameResolver<'a> {
    names: &'a NameIndex,
    default_extension: &'a str,
}

impl<'a> NameResolver<'a> {
    pub fn new(names: &'a NameIndex, default_extension: &'a str) -> Self {
        Self {
            names,
            default_extension,
        }
    }

    /// Resolve a link target.
    ///
    /// - `/abs/path` is returned as is (it may be virtual), unless only the
    ///   variant with the default extension is tracked.
    /// - `Name` and `Name.md` are looked up by basename.
    /// - `dir/Name` narrows the basename candidates to paths ending in `/dir/Name`.
    pub fn resolve(&self, target: &str) -> Resolution {
        let target = target.trim();
        if target.is_empty() {
            return Resolution::Unresolved;
        }

        if DocPath::is_absolute_target(target) {
            let exact = DocPath::new(target);
            if !self.names.contains(&exact) {
                let with_ext = DocPath::new(self.with_extension(target));
                if self.names.contains(&with_ext) {
                    return Resolution::Found(with_ext);
                }
            }
            return Resolution::Found(exact);
        }

        let mut candidates = self.lookup(target);
        if candidates.is_empty() {
            candidates = self.lookup(&self.with_extension(target));
        }

        match candidates.len() {
            0 => Resolution::Unresolved,
            1 => Resolution::Found(candidates.remove(0)),
            _ => Resolution::Ambiguous(candidates),
        }
    }

    fn lookup(&self, target: &str) -> Vec<DocPath> {
        let basename = target.rsplit('/').next().unwrap_or(target);
        let Some(paths) = self.names.candidates(basename) else {
            return Vec::new();
        };
        if basename.len() == target.len() {
            return paths.iter().cloned().collect();
        }

        let qualified = DocPath::new(target);
        paths
            .iter()
            .filter(|path| path.as_str().ends_with(qualified.as_str()))
            .cloned()
            .collect()
    }

    fn with_extension(&self, target: &str) -> String {
        if self.default_extension.is_empty() {
            target.to_string()
        } else {
            format!("{}.{}", target, self.default_extension)
        }
    }
}

impl AmbiguityPolicy {
    /// Pick one of `candidates` for a link written in `source`.
    /// `candidates` must be sorted; returns `None` for the `Unresolved` policy.
    pub fn choose(&self, source: &DocPath, candidates: &[DocPath]) -> Option<DocPath> {
        match self {
            AmbiguityPolicy::Unresolved => None,
            AmbiguityPolicy::First => candidates.first().cloned(),
            AmbiguityPolicy::Nearest => {
                let mut best: Option<(&DocPath, usize)> = None;
                for candidate in candidates {
                    let shared = shared_directory_depth(source, candidate);
                    if best.is_none_or(|(_, depth)| shared > depth) {
                        best = Some((candidate, shared));
                    }
                }
                best.map(|(path, _)| path.clone())
            }
        }
    }
}

fn shared_directory_depth(a: &DocPath, b: &DocPath) -> usize {
    a.parent()
        .split('/')
        .zip(b.parent().split('/'))
        .skip(1)
        .take_while(|(x, y)| x == y)
        .count()
}
