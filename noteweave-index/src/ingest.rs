//! Applies filesystem change events to the caches.
//!
//! Events arrive one at a time, from the in-process watcher or from an
//! external transport. Each is checked against disk and the catalog before
//! it is applied, so a late event for a path that has since been renamed or
//! deleted is dropped rather than resurrecting an old identity.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::engine::IndexEngine;
use crate::errors::IndexResult;
use crate::locks::folder_key;
use crate::paths::is_markdown;
use crate::scan::ScannedDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Add,
    Change,
    Unlink,
    AddDir,
    UnlinkDir,
}

impl ChangeKind {
    pub fn is_dir(self) -> bool {
        matches!(self, Self::AddDir | Self::UnlinkDir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event: ChangeKind,
    pub folder: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum IngestOutcome {
    Added { title: String },
    Updated { title: String },
    Renamed { from: String, to: String },
    Removed { title: String },
    Refreshed,
    Ignored { reason: String },
}

impl IngestOutcome {
    fn ignored(reason: &str) -> Self {
        Self::Ignored {
            reason: reason.to_string(),
        }
    }
}

/// Apply one event as an incremental patch, or rebuild when a patch cannot
/// be trusted.
pub async fn apply_change(engine: &IndexEngine, event: &ChangeEvent) -> IndexResult<IngestOutcome> {
    let settings = engine.settings();
    if event.folder.is_empty()
        || event.folder.starts_with('.')
        || event.folder == settings.trash_folder
    {
        return Ok(IngestOutcome::ignored("outside indexed folders"));
    }

    if !engine.is_ready().await {
        // First scan covers whatever this event describes.
        engine.initialize().await?;
        return Ok(IngestOutcome::Refreshed);
    }

    if event.event.is_dir() {
        engine.refresh().await?;
        return Ok(IngestOutcome::Refreshed);
    }

    if event.filename.contains(['/', '\\']) || !is_markdown(Path::new(&event.filename)) {
        return Ok(IngestOutcome::ignored("not a markdown document"));
    }

    // Serialized with API writes to the same folder.
    let path = engine.folder_path(&event.folder).join(&event.filename);
    engine
        .locks()
        .with_lock(&folder_key(&event.folder), async {
            match event.event {
                ChangeKind::Unlink => apply_unlink(engine, event, &path).await,
                _ => apply_upsert(engine, event, &path).await,
            }
        })
        .await
}

async fn apply_upsert(
    engine: &IndexEngine,
    event: &ChangeEvent,
    path: &Path,
) -> IndexResult<IngestOutcome> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(IngestOutcome::ignored("file no longer exists"));
        }
        Err(err) => return Err(err.into()),
    };
    let doc = ScannedDocument::from_raw(&event.folder, &event.filename, raw);
    let folder = doc.folder.as_str();

    let mut state = engine.state().write().await;
    let by_filename = state.catalog.get_by_filename(folder, &doc.filename).cloned();
    let title_owner = state.catalog.get_by_title(folder, &doc.title).cloned();

    if let Some(owner) = title_owner.filter(|owner| owner.filename != doc.filename) {
        drop(state);
        tracing::warn!(
            folder,
            filename = %doc.filename,
            other = %owner.filename,
            "external change collides with another document's title; rebuilding"
        );
        engine.refresh().await?;
        return Ok(IngestOutcome::Refreshed);
    }

    let outcome = match by_filename {
        Some(existing) if existing.title == doc.title => {
            state.catalog.set_tags(folder, &doc.title, doc.tags.clone());
            state
                .graph
                .update_document(folder, &doc.title, &doc.filename, &doc.content);
            IngestOutcome::Updated { title: doc.title.clone() }
        }
        Some(existing) => {
            // The file is authoritative: other documents still link to the
            // old title on disk, so their links are not retargeted.
            state
                .catalog
                .update_document(folder, &existing.title, &doc.title, &doc.filename);
            state.catalog.set_tags(folder, &doc.title, doc.tags.clone());
            state.graph.remove_document(folder, &existing.title);
            state
                .graph
                .add_document(folder, &doc.title, &doc.filename, &doc.content);
            IngestOutcome::Renamed {
                from: existing.title,
                to: doc.title.clone(),
            }
        }
        None => {
            state
                .catalog
                .add_document(&doc.title, &doc.filename, folder, doc.tags.clone());
            state
                .graph
                .add_document(folder, &doc.title, &doc.filename, &doc.content);
            IngestOutcome::Added { title: doc.title.clone() }
        }
    };
    state.tags.add_tags(&doc.tags);
    tracing::debug!(folder, filename = %doc.filename, ?outcome, "change ingested");
    Ok(outcome)
}

async fn apply_unlink(
    engine: &IndexEngine,
    event: &ChangeEvent,
    path: &Path,
) -> IndexResult<IngestOutcome> {
    if tokio::fs::try_exists(path).await? {
        return Ok(IngestOutcome::ignored("file exists again"));
    }

    let removed = {
        let mut state = engine.state().write().await;
        let Some(entry) = state
            .catalog
            .get_by_filename(&event.folder, &event.filename)
            .cloned()
        else {
            return Ok(IngestOutcome::ignored("file is not cataloged"));
        };
        state.catalog.remove_document(&event.folder, &entry.title);
        state.graph.remove_document(&event.folder, &entry.title);
        entry
    };

    engine.refresh_tags().await?;
    tracing::debug!(folder = %event.folder, filename = %event.filename, "removal ingested");
    Ok(IngestOutcome::Removed {
        title: removed.title,
    })
}

/// Consume events until every sender is gone. A failed patch falls back to a
/// full rebuild.
pub async fn run_ingestion(engine: Arc<IndexEngine>, mut rx: mpsc::Receiver<ChangeEvent>) {
    while let Some(event) = rx.recv().await {
        match apply_change(&engine, &event).await {
            Ok(IngestOutcome::Ignored { reason }) => {
                tracing::debug!(
                    folder = %event.folder,
                    filename = %event.filename,
                    "change event ignored: {reason}"
                );
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(
                    folder = %event.folder,
                    filename = %event.filename,
                    "change ingestion failed, rebuilding: {err}"
                );
                if let Err(err) = engine.refresh().await {
                    tracing::warn!("index rebuild failed: {err}");
                }
            }
        }
    }
    tracing::debug!("change ingestion stopped");
}
