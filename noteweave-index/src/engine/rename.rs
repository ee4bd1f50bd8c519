//! Title rename with link rewriting across the document's folder.
//!
//! Order of operations:
//! 1. locate the document and validate the new title and filename;
//! 2. rewrite `[[old]]` links in every other file of the folder;
//! 3. rename the file, then write its content under the new title;
//! 4. patch catalog, tags and graph.
//!
//! Nothing touches disk before validation passes. A file that cannot be
//! rewritten in step 2 is reported and skipped; the rename itself still
//! completes and the caches are rebuilt from disk afterwards.

use std::path::Path;

use crate::errors::{IndexError, IndexResult};
use crate::links::rewrite_links;
use crate::locks::folder_key;
use crate::models::{CascadeFailure, CascadeReport, CatalogEntry};
use crate::normalize::titles_match;
use crate::parser::parse_tags;
use crate::paths::{filename_for_title, is_markdown, write_atomic};
use crate::scan::is_hidden;

use super::IndexEngine;
use super::documents::{locate, with_title};

pub(crate) async fn rename_document(
    engine: &IndexEngine,
    folder: &str,
    old_title: &str,
    new_title: &str,
    content: Option<String>,
) -> IndexResult<(CatalogEntry, CascadeReport)> {
    if new_title.trim().is_empty() {
        return Err(IndexError::InvalidName(new_title.to_string()));
    }
    engine.initialize().await?;
    engine
        .locks()
        .with_lock(
            &folder_key(folder),
            rename_locked(engine, folder, old_title, new_title, content),
        )
        .await
}

async fn rename_locked(
    engine: &IndexEngine,
    folder: &str,
    old_title: &str,
    new_title: &str,
    content: Option<String>,
) -> IndexResult<(CatalogEntry, CascadeReport)> {
    let cached = engine
        .state()
        .read()
        .await
        .catalog
        .get_by_title(folder, old_title)
        .cloned();
    let entry = match cached {
        Some(entry) => entry,
        None => locate(engine, Some(folder), old_title).await?,
    };

    if !titles_match(&entry.title, new_title)
        && engine
            .state()
            .read()
            .await
            .catalog
            .has_title_in_folder(new_title, folder)?
    {
        return Err(IndexError::Collision {
            folder: folder.to_string(),
            title: new_title.to_string(),
        });
    }

    let dir = engine.folder_path(folder);
    let new_filename = filename_for_title(new_title);
    let old_path = dir.join(&entry.filename);
    let new_path = dir.join(&new_filename);
    let same_file = new_filename.to_lowercase() == entry.filename.to_lowercase();
    if !same_file && tokio::fs::try_exists(&new_path).await? {
        return Err(IndexError::FilenameCollision {
            folder: folder.to_string(),
            filename: new_filename,
        });
    }

    let own = match content {
        Some(content) => content,
        None => tokio::fs::read_to_string(&old_path).await?,
    };

    let report = rewrite_references(&dir, &entry.filename, &entry.title, new_title).await?;

    if new_filename != entry.filename {
        tokio::fs::rename(&old_path, &new_path).await?;
    }
    let own = rewrite_links(&own, &entry.title, new_title).unwrap_or(own);
    let own = with_title(&own, new_title, &new_filename);
    write_atomic(&new_path, &own).await?;

    let tags = parse_tags(&own);
    {
        let mut state = engine.state().write().await;
        if !state
            .catalog
            .update_document(folder, &entry.title, new_title, &new_filename)
        {
            state
                .catalog
                .add_document(new_title, &new_filename, folder, Vec::new());
        }
        state.catalog.set_tags(folder, new_title, tags.clone());
        state.tags.add_tags(&tags);
        state
            .graph
            .rename_document(folder, &entry.title, new_title, &new_filename, &own);
    }

    if !report.is_clean() {
        for failure in &report.failed {
            tracing::warn!(
                folder,
                filename = %failure.filename,
                "link rewrite failed: {}",
                failure.error
            );
        }
        engine.refresh().await?;
    }
    tracing::info!(
        folder,
        from = %entry.title,
        to = new_title,
        rewritten = report.rewritten.len(),
        failed = report.failed.len(),
        "document renamed"
    );

    Ok((
        CatalogEntry {
            title: new_title.to_string(),
            filename: new_filename,
            folder: folder.to_string(),
            tags,
        },
        report,
    ))
}

/// Rewrite links to `old_title` in every markdown file of `dir` except
/// `own_filename`, skipping hidden files the index never scans. Keeps going
/// past individual failures.
async fn rewrite_references(
    dir: &Path,
    own_filename: &str,
    old_title: &str,
    new_title: &str,
) -> IndexResult<CascadeReport> {
    let mut filenames = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_markdown(&path) {
            continue;
        }
        match path.file_name().and_then(|name| name.to_str()) {
            Some(name) if name != own_filename && !is_hidden(name) => {
                filenames.push(name.to_string())
            }
            _ => {}
        }
    }
    filenames.sort();

    let mut report = CascadeReport::default();
    for filename in filenames {
        match rewrite_file(&dir.join(&filename), old_title, new_title).await {
            Ok(true) => report.rewritten.push(filename),
            Ok(false) => {}
            Err(err) => report.failed.push(CascadeFailure {
                filename,
                error: err.to_string(),
            }),
        }
    }
    Ok(report)
}

async fn rewrite_file(path: &Path, old_title: &str, new_title: &str) -> IndexResult<bool> {
    let raw = tokio::fs::read_to_string(path).await?;
    match rewrite_links(&raw, old_title, new_title) {
        Some(updated) => {
            write_atomic(path, &updated).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}
