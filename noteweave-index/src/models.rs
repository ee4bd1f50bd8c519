use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::normalize;

/// Folder-scoped document identity: the same title may exist in two folders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocKey {
    pub folder: String,
    /// Normalized title.
    pub title: String,
}

impl DocKey {
    pub fn new(folder: &str, title: &str) -> Self {
        Self {
            folder: folder.to_string(),
            title: normalize(title),
        }
    }
}

/// Catalog record for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub filename: String,
    pub folder: String,
    pub tags: Vec<String>,
}

/// API projection of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub title: String,
    pub folder: String,
    pub filename: String,
    pub links: Vec<String>,
    pub backlinks: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub folder: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    pub content: String,
    #[serde(default)]
    pub new_title: Option<String>,
}

/// Render-ready graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNodeView {
    pub id: u64,
    pub title: String,
    pub folder: String,
    pub filename: String,
    pub tags: Vec<String>,
    pub neighbors: Vec<String>,
    pub back_links: Vec<String>,
    pub size: u32,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: u64,
    pub target: u64,
}

/// Read-only graph snapshot; nodes keyed by `<folder>/<filename>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: BTreeMap<String, GraphNodeView>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashItem {
    pub filename: String,
    pub title: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeFailure {
    pub filename: String,
    pub error: String,
}

/// Per-file outcome of rewriting referencing documents during a rename.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    pub rewritten: Vec<String>,
    pub failed: Vec<CascadeFailure>,
}

impl CascadeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of an update that may have renamed the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub document: Document,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascade: Option<CascadeReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSummary {
    pub name: String,
    pub document_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDeleteResult {
    pub folder: String,
    pub trashed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub title: String,
    pub folder: String,
    /// Filename inside the trash folder; `None` when deleted permanently.
    pub trash_filename: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveDocumentRequest {
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(alias = "target_folder")]
    pub target_folder: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreRequest {
    #[serde(default)]
    pub folder: Option<String>,
}
