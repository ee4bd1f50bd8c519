//! Disk scans over `<root>/<folder>/*.md`.

use std::path::Path;

use walkdir::WalkDir;

use crate::errors::IndexResult;
use crate::graph::GraphSource;
use crate::models::CatalogEntry;
use crate::parser::parse_document;
use crate::paths::{file_stem, is_markdown};

/// One markdown file as found on disk.
#[derive(Debug, Clone)]
pub struct ScannedDocument {
    pub folder: String,
    pub filename: String,
    pub title: String,
    pub tags: Vec<String>,
    pub content: String,
}

impl ScannedDocument {
    pub fn from_raw(folder: &str, filename: &str, content: String) -> Self {
        let parsed = parse_document(&content, file_stem(filename));
        Self {
            folder: folder.to_string(),
            filename: filename.to_string(),
            title: parsed.title,
            tags: parsed.tags,
            content,
        }
    }

    pub fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            title: self.title.clone(),
            filename: self.filename.clone(),
            folder: self.folder.clone(),
            tags: self.tags.clone(),
        }
    }

    pub fn graph_source(&self) -> GraphSource {
        GraphSource {
            folder: self.folder.clone(),
            title: self.title.clone(),
            filename: self.filename.clone(),
            content: self.content.clone(),
        }
    }
}

pub(crate) fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Folder directories directly under `root`, excluding hidden ones and the
/// trash folder, sorted by name.
pub async fn list_folder_dirs(root: &Path, trash_folder: &str) -> IndexResult<Vec<String>> {
    if !tokio::fs::try_exists(root).await? {
        return Ok(Vec::new());
    }

    let mut folders = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if is_hidden(&name) || name == trash_folder {
            continue;
        }
        folders.push(name);
    }
    folders.sort();
    Ok(folders)
}

/// Every document in every folder, ordered by folder then filename.
pub async fn scan_notes(root: &Path, trash_folder: &str) -> IndexResult<Vec<ScannedDocument>> {
    let mut documents = Vec::new();
    for folder in list_folder_dirs(root, trash_folder).await? {
        documents.extend(scan_folder(root, &folder).await?);
    }
    Ok(documents)
}

/// Documents of a single folder, ordered by filename. A missing folder scans
/// as empty. Unreadable files are skipped with a warning.
pub async fn scan_folder(root: &Path, folder: &str) -> IndexResult<Vec<ScannedDocument>> {
    let dir = root.join(folder);
    if !tokio::fs::try_exists(&dir).await? {
        return Ok(Vec::new());
    }

    let mut documents = Vec::new();
    let walker = WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker.into_iter().filter_map(|entry| entry.ok()) {
        if !entry.file_type().is_file() || !is_markdown(entry.path()) {
            continue;
        }
        let Some(filename) = entry.file_name().to_str() else {
            continue;
        };
        if is_hidden(filename) {
            continue;
        }
        match tokio::fs::read_to_string(entry.path()).await {
            Ok(raw) => documents.push(ScannedDocument::from_raw(folder, filename, raw)),
            Err(err) => {
                tracing::warn!(path = %entry.path().display(), "skipping unreadable document: {err}");
            }
        }
    }
    Ok(documents)
}
