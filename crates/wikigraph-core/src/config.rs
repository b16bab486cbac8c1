//! Workspace configuration and document inclusion rules

use std::path::Path;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::model::DocPath;

/// Optional configuration file looked up at the corpus root.
pub const CONFIG_FILE: &str = "wikigraph.toml";

/// Which link syntaxes the scanner recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkSyntax {
    /// `[[target]]`
    #[default]
    Wiki,
    /// `[text](target)`
    Markdown,
    Both,
}

impl LinkSyntax {
    pub fn wiki(self) -> bool {
        matches!(self, LinkSyntax::Wiki | LinkSyntax::Both)
    }

    pub fn markdown(self) -> bool {
        matches!(self, LinkSyntax::Markdown | LinkSyntax::Both)
    }
}

/// How a link whose basename matches several documents is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityPolicy {
    /// Candidate sharing the longest directory prefix with the linking document.
    #[default]
    Nearest,
    /// Lexicographically first candidate path.
    First,
    /// Leave the link unresolved.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7890,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Globs (relative to the corpus root) a document must match to be tracked.
    pub include: Vec<String>,
    /// Globs that exclude an otherwise included document.
    pub exclude: Vec<String>,
    pub link_syntax: LinkSyntax,
    /// Appended to bare link targets during resolution.
    pub default_extension: String,
    pub ambiguity: AmbiguityPolicy,
    /// Quiet interval for the change coalescer.
    pub debounce_ms: u64,
    pub server: ServerSection,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*.md".to_string()],
            exclude: vec![
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
            ],
            link_syntax: LinkSyntax::default(),
            default_extension: "md".to_string(),
            ambiguity: AmbiguityPolicy::default(),
            debounce_ms: 300,
            server: ServerSection::default(),
        }
    }
}

impl WorkspaceConfig {
    /// Load `wikigraph.toml` from `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.is_file() {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE, root.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        let config = toml::from_str(&text).map_err(|source| IndexError::Config {
            origin: path.display().to_string(),
            source,
        })?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|source| IndexError::Config {
            origin: "<inline>".to_string(),
            source,
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn inclusion_rules(&self) -> Result<InclusionRules> {
        InclusionRules::new(&self.include, &self.exclude)
    }
}

/// Compiled include/exclude globs.
#[derive(Debug, Clone)]
pub struct InclusionRules {
    include: GlobSet,
    exclude: GlobSet,
}

impl InclusionRules {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: build_glob_set(include)?,
            exclude: build_glob_set(exclude)?,
        })
    }

    /// Patterns are matched against the path without its leading `/`.
    pub fn is_included(&self, path: &DocPath) -> bool {
        let relative = path.as_str().trim_start_matches('/');
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| IndexError::InvalidGlob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| IndexError::InvalidGlob {
        pattern: patterns.join(", "),
        source,
    })
}
