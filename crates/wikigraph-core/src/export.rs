//! Wire format consumed by the graph renderer
//!
//! The layout mimics a graph-database query result:
//! `results[0].data[0].graph.{nodes, relationships}`.

use serde::{Deserialize, Serialize};

use crate::model::Document;
use crate::view::{GraphView, LinkCategory, ViewRelationship};

pub const NODE_LABEL: &str = "File";
pub const RELATIONSHIP_TYPE: &str = "LINKS_TO";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub results: Vec<ExportResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResult {
    pub columns: Vec<String>,
    pub data: Vec<ExportData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportData {
    pub graph: ExportGraph,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportGraph {
    pub nodes: Vec<ExportNode>,
    pub relationships: Vec<ExportRelationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: NodeProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProperties {
    /// Absolute filesystem location, present for tracked documents that have one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_fs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_file_virtual: Option<bool>,
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRelationship {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub start_node: String,
    pub end_node: String,
    pub properties: RelationshipProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_category: Option<LinkCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_backlink: Option<bool>,
}

impl GraphExport {
    /// The graph payload, if present.
    pub fn graph(&self) -> Option<&ExportGraph> {
        self.results
            .first()
            .and_then(|r| r.data.first())
            .map(|d| &d.graph)
    }
}

impl From<&Document> for ExportNode {
    fn from(node: &Document) -> Self {
        let (file_fs, is_file_virtual) = match node {
            Document::Tracked { location, .. } => (
                location.as_ref().map(|l| l.to_string_lossy().into_owned()),
                None,
            ),
            Document::Virtual { .. } => (None, Some(true)),
        };
        ExportNode {
            id: node.id().to_string(),
            labels: vec![NODE_LABEL.to_string()],
            properties: NodeProperties {
                file_fs,
                is_file_virtual,
                name: node.file_name().to_string(),
                path: node.id().to_string(),
            },
        }
    }
}

impl From<&ViewRelationship> for ExportRelationship {
    fn from(rel: &ViewRelationship) -> Self {
        ExportRelationship {
            id: rel.id(),
            kind: RELATIONSHIP_TYPE.to_string(),
            start_node: rel.start.clone(),
            end_node: rel.end.clone(),
            properties: RelationshipProperties {
                link_category: Some(rel.category),
                is_backlink: rel.is_backlink.then_some(true),
            },
        }
    }
}

impl From<&GraphView> for GraphExport {
    fn from(view: &GraphView) -> Self {
        GraphExport {
            results: vec![ExportResult {
                columns: vec![NODE_LABEL.to_string()],
                data: vec![ExportData {
                    graph: ExportGraph {
                        nodes: view.nodes.iter().map(ExportNode::from).collect(),
                        relationships: view
                            .relationships
                            .iter()
                            .map(ExportRelationship::from)
                            .collect(),
                    },
                }],
            }],
        }
    }
}

impl GraphView {
    pub fn to_export(&self) -> GraphExport {
        GraphExport::from(self)
    }
}
