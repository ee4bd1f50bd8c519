//! Document index and graph cache for a folder-organized markdown notes root.

pub mod catalog;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod ingest;
pub mod links;
pub mod locks;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod paths;
pub mod scan;
pub mod tags;
pub mod watcher;

pub use engine::IndexEngine;
pub use errors::{IndexError, IndexResult};
pub use ingest::{ChangeEvent, ChangeKind, IngestOutcome, apply_change, run_ingestion};
pub use models::{
    CascadeFailure, CascadeReport, CatalogEntry, CreateDocumentRequest, DeleteResult, DocKey,
    Document, FolderDeleteResult, FolderSummary, GraphEdge, GraphNodeView, GraphSnapshot,
    MoveDocumentRequest, RestoreRequest, TrashItem, UpdateDocumentRequest, UpdateOutcome,
};
pub use noteweave_core::config::{BacklinkScope, IndexSettings};
pub use normalize::{normalize, titles_match};
pub use watcher::run_watcher;
