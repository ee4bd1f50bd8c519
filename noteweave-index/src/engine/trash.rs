use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::errors::{IndexError, IndexResult};
use crate::locks::folder_key;
use crate::models::{CatalogEntry, Document, TrashItem};
use crate::parser::{parse_document, parse_tags};
use crate::paths::{
    file_stem, filename_for_title, is_markdown, unique_filename, validate_filename, write_atomic,
};

use super::IndexEngine;
use super::documents::{project, with_title};

/// Move `path` into the trash folder under a free name. The file's mtime is
/// reset so it records the deletion time.
pub(crate) async fn move_to_trash(
    engine: &IndexEngine,
    path: &Path,
    filename: &str,
) -> IndexResult<String> {
    let trash = engine.trash_path();
    tokio::fs::create_dir_all(&trash).await?;
    let name = unique_filename(&trash, filename).await?;
    let dest = trash.join(&name);
    tokio::fs::rename(path, &dest).await?;

    tokio::task::spawn_blocking(move || {
        std::fs::File::options()
            .write(true)
            .open(&dest)?
            .set_modified(SystemTime::now())
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(name)
}

fn elapsed_days(deleted_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    deleted_at
        .map(|deleted| (now - deleted).num_days().max(0))
        .unwrap_or(0)
}

fn days_remaining(retention_days: u32, deleted_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    (i64::from(retention_days) - elapsed_days(deleted_at, now)).max(0)
}

pub(crate) async fn list_trash(engine: &IndexEngine) -> IndexResult<Vec<TrashItem>> {
    let dir = engine.trash_path();
    if !tokio::fs::try_exists(&dir).await? {
        return Ok(Vec::new());
    }

    let now = Utc::now();
    let retention = engine.settings().trash_retention_days;
    let mut items = Vec::new();
    let mut entries = tokio::fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_markdown(&path) || !entry.file_type().await?.is_file() {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let deleted_at = entry
            .metadata()
            .await
            .ok()
            .and_then(|meta| meta.modified().ok())
            .map(DateTime::<Utc>::from);
        let title = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => parse_document(&raw, file_stem(&filename)).title,
            Err(_) => file_stem(&filename).to_string(),
        };
        items.push(TrashItem {
            days_remaining: days_remaining(retention, deleted_at, now),
            filename,
            title,
            deleted_at,
        });
    }

    items.sort_by(|a, b| {
        b.deleted_at
            .cmp(&a.deleted_at)
            .then_with(|| a.filename.cmp(&b.filename))
    });
    Ok(items)
}

/// Move a trashed file back into `folder` (default folder when `None`).
pub(crate) async fn restore(
    engine: &IndexEngine,
    filename: &str,
    folder: Option<&str>,
) -> IndexResult<Document> {
    let filename = validate_filename(filename)?;
    engine.initialize().await?;
    let folder = engine.resolve_folder(folder)?;
    let source = engine.trash_path().join(filename);
    if !is_markdown(&source) || !tokio::fs::try_exists(&source).await? {
        return Err(IndexError::TrashItemNotFound(filename.to_string()));
    }

    let entry = engine
        .locks()
        .with_lock(&folder_key(&folder), async {
            let raw = tokio::fs::read_to_string(&source).await?;
            let title = parse_document(&raw, file_stem(filename)).title;
            if engine
                .state()
                .read()
                .await
                .catalog
                .has_title_in_folder(&title, &folder)?
            {
                return Err(IndexError::Collision {
                    folder: folder.clone(),
                    title,
                });
            }

            let dir = engine.folder_path(&folder);
            tokio::fs::create_dir_all(&dir).await?;
            let target = unique_filename(&dir, &filename_for_title(&title)).await?;
            let dest = dir.join(&target);
            tokio::fs::rename(&source, &dest).await?;

            let content = with_title(&raw, &title, &target);
            if content != raw {
                write_atomic(&dest, &content).await?;
            }
            let tags = parse_tags(&content);
            {
                let mut state = engine.state().write().await;
                state
                    .catalog
                    .add_document(&title, &target, &folder, tags.clone());
                state.tags.add_tags(&tags);
                state.graph.add_document(&folder, &title, &target, &content);
            }
            tracing::info!(folder = %folder, title = %title, filename = %target, "document restored");

            Ok::<_, IndexError>(CatalogEntry {
                title,
                filename: target,
                folder: folder.clone(),
                tags,
            })
        })
        .await?;

    project(engine, &entry, false, engine.backlink_scope(Some(&folder))).await
}

pub(crate) async fn delete_permanently(engine: &IndexEngine, filename: &str) -> IndexResult<()> {
    let filename = validate_filename(filename)?;
    let path = engine.trash_path().join(filename);
    if !is_markdown(&path) || !tokio::fs::try_exists(&path).await? {
        return Err(IndexError::TrashItemNotFound(filename.to_string()));
    }
    tokio::fs::remove_file(&path).await?;
    tracing::info!(filename, "trash item deleted");
    Ok(())
}

pub(crate) async fn purge_expired(engine: &IndexEngine) -> IndexResult<Vec<String>> {
    let retention = i64::from(engine.settings().trash_retention_days);
    let now = Utc::now();
    let mut purged = Vec::new();
    for item in list_trash(engine).await? {
        if elapsed_days(item.deleted_at, now) < retention {
            continue;
        }
        tokio::fs::remove_file(engine.trash_path().join(&item.filename)).await?;
        purged.push(item.filename);
    }
    if !purged.is_empty() {
        tracing::info!(count = purged.len(), "expired trash purged");
    }
    Ok(purged)
}
