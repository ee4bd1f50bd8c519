use std::path::Path;

use chrono::{DateTime, Utc};

use crate::BacklinkScope;
use crate::errors::{IndexError, IndexResult};
use crate::links::calculate_backlinks;
use crate::locks::folder_key;
use crate::models::{
    CatalogEntry, CreateDocumentRequest, DeleteResult, Document, UpdateDocumentRequest,
    UpdateOutcome,
};
use crate::normalize::{compose, normalize, titles_match};
use crate::parser::{declared_title, parse_document, parse_tags, upsert_title};
use crate::paths::{file_stem, filename_for_title, write_atomic};
use crate::scan::scan_folder;

use super::{IndexEngine, rename, trash};

/// Content whose resolvable title is `title`, given it is stored as `filename`.
pub(crate) fn with_title(content: &str, title: &str, filename: &str) -> String {
    if parse_document(content, file_stem(filename)).title == title {
        content.to_string()
    } else {
        upsert_title(content, title)
    }
}

/// Find a document's catalog entry. A catalog miss is confirmed against the
/// folder on disk; a hit there means the catalog is stale and gets rebuilt.
pub(crate) async fn locate(
    engine: &IndexEngine,
    folder: Option<&str>,
    title: &str,
) -> IndexResult<CatalogEntry> {
    engine.initialize().await?;
    let requested = match folder {
        Some(folder) => Some(engine.resolve_folder(Some(folder))?),
        None => None,
    };

    {
        let state = engine.state().read().await;
        let found = match &requested {
            Some(folder) => state.catalog.get_by_title(folder, title).cloned(),
            None => {
                let matches = state.catalog.find_title(title);
                matches
                    .iter()
                    .find(|entry| entry.folder == engine.settings().default_folder)
                    .or(matches.first())
                    .map(|entry| (*entry).clone())
            }
        };
        if let Some(entry) = found {
            return Ok(entry);
        }
    }

    let folder = requested.unwrap_or_else(|| engine.settings().default_folder.clone());
    let on_disk = scan_folder(engine.root(), &folder)
        .await?
        .into_iter()
        .find(|doc| titles_match(&doc.title, title));
    match on_disk {
        Some(doc) => {
            tracing::warn!(folder = %folder, title, "catalog missed a document on disk; rebuilding");
            engine.refresh().await?;
            Ok(doc.catalog_entry())
        }
        None => Err(IndexError::NotFound {
            folder,
            title: title.to_string(),
        }),
    }
}

async fn file_times(path: &Path) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match tokio::fs::metadata(path).await {
        Ok(meta) => (
            meta.created().ok().map(DateTime::<Utc>::from),
            meta.modified().ok().map(DateTime::<Utc>::from),
        ),
        Err(_) => (None, None),
    }
}

/// API projection of a cataloged document.
pub(crate) async fn project(
    engine: &IndexEngine,
    entry: &CatalogEntry,
    include_content: bool,
    scope: BacklinkScope,
) -> IndexResult<Document> {
    let (links, backlinks) = {
        let state = engine.state().read().await;
        let links = state.graph.links(&entry.folder, &entry.title);
        let backlinks = match scope {
            BacklinkScope::Folder => state.graph.backlinks(&entry.folder, &entry.title),
            BacklinkScope::Global => {
                let lists = state.graph.link_lists(None);
                calculate_backlinks(lists.iter().map(|(t, l)| (t.as_str(), l.as_slice())))
                    .remove(&normalize(&entry.title))
                    .unwrap_or_default()
            }
        };
        (links, backlinks)
    };

    let path = engine.folder_path(&entry.folder).join(&entry.filename);
    let (created_at, modified_at) = file_times(&path).await;
    let content = if include_content {
        Some(tokio::fs::read_to_string(&path).await?)
    } else {
        None
    };

    Ok(Document {
        title: entry.title.clone(),
        folder: entry.folder.clone(),
        filename: entry.filename.clone(),
        links,
        backlinks,
        tags: entry.tags.clone(),
        created_at,
        modified_at,
        content,
    })
}

pub(crate) async fn get_document(
    engine: &IndexEngine,
    folder: Option<&str>,
    title: &str,
) -> IndexResult<Document> {
    let entry = locate(engine, folder, title).await?;
    project(engine, &entry, true, engine.backlink_scope(folder)).await
}

pub(crate) async fn list_documents(
    engine: &IndexEngine,
    folder: Option<&str>,
) -> IndexResult<Vec<Document>> {
    engine.initialize().await?;
    let folder = match folder {
        Some(folder) => Some(engine.resolve_folder(Some(folder))?),
        None => None,
    };
    let scope = engine.backlink_scope(folder.as_deref());

    let rows: Vec<(CatalogEntry, Vec<String>, Vec<String>)> = {
        let state = engine.state().read().await;
        let entries: Vec<CatalogEntry> = match &folder {
            Some(folder) => state.catalog.get_documents_by_folder(folder),
            None => state.catalog.get_documents(),
        }
        .into_iter()
        .cloned()
        .collect();

        // One backlink map per call, over the folder or over everything.
        let lists = match scope {
            BacklinkScope::Folder => state.graph.link_lists(folder.as_deref()),
            BacklinkScope::Global => state.graph.link_lists(None),
        };
        let backlinks =
            calculate_backlinks(lists.iter().map(|(t, l)| (t.as_str(), l.as_slice())));

        entries
            .into_iter()
            .map(|entry| {
                let links = state.graph.links(&entry.folder, &entry.title);
                let sources = backlinks
                    .get(&normalize(&entry.title))
                    .cloned()
                    .unwrap_or_default();
                (entry, links, sources)
            })
            .collect()
    };

    let mut documents = Vec::with_capacity(rows.len());
    for (entry, links, backlinks) in rows {
        let path = engine.folder_path(&entry.folder).join(&entry.filename);
        let (created_at, modified_at) = file_times(&path).await;
        documents.push(Document {
            title: entry.title,
            folder: entry.folder,
            filename: entry.filename,
            links,
            backlinks,
            tags: entry.tags,
            created_at,
            modified_at,
            content: None,
        });
    }
    Ok(documents)
}

pub(crate) async fn list_titles(
    engine: &IndexEngine,
    folder: Option<&str>,
) -> IndexResult<Vec<String>> {
    engine.initialize().await?;
    let folder = match folder {
        Some(folder) => Some(engine.resolve_folder(Some(folder))?),
        None => None,
    };
    let state = engine.state().read().await;
    let mut titles: Vec<String> = match &folder {
        Some(folder) => state.catalog.get_documents_by_folder(folder),
        None => state.catalog.get_documents(),
    }
    .into_iter()
    .map(|entry| entry.title.clone())
    .collect();
    if folder.is_none() {
        titles.sort_by_key(|title| normalize(title));
        titles.dedup();
    }
    Ok(titles)
}

pub(crate) async fn create_document(
    engine: &IndexEngine,
    request: CreateDocumentRequest,
) -> IndexResult<Document> {
    engine.initialize().await?;
    let folder = engine.resolve_folder(request.folder.as_deref())?;
    let title = compose(request.title.trim());
    if title.is_empty() {
        return Err(IndexError::InvalidName(request.title));
    }

    let entry = engine
        .locks()
        .with_lock(
            &folder_key(&folder),
            create_locked(engine, &folder, &title, &request.content),
        )
        .await?;
    project(engine, &entry, false, engine.backlink_scope(Some(&folder))).await
}

async fn create_locked(
    engine: &IndexEngine,
    folder: &str,
    title: &str,
    content: &str,
) -> IndexResult<CatalogEntry> {
    if engine
        .state()
        .read()
        .await
        .catalog
        .has_title_in_folder(title, folder)?
    {
        return Err(IndexError::Collision {
            folder: folder.to_string(),
            title: title.to_string(),
        });
    }

    let filename = filename_for_title(title);
    let dir = engine.folder_path(folder);
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(&filename);
    if tokio::fs::try_exists(&path).await? {
        return Err(IndexError::FilenameCollision {
            folder: folder.to_string(),
            filename,
        });
    }

    let content = with_title(content, title, &filename);
    write_atomic(&path, &content).await?;

    let tags = parse_tags(&content);
    {
        let mut state = engine.state().write().await;
        state
            .catalog
            .add_document(title, &filename, folder, tags.clone());
        state.tags.add_tags(&tags);
        state.graph.add_document(folder, title, &filename, &content);
    }
    tracing::info!(folder, title, filename = %filename, "document created");

    Ok(CatalogEntry {
        title: title.to_string(),
        filename,
        folder: folder.to_string(),
        tags,
    })
}

/// Write new content. A different title, given explicitly or declared by the
/// new content, turns the update into a rename cascade.
pub(crate) async fn update_document(
    engine: &IndexEngine,
    folder: Option<&str>,
    title: &str,
    request: UpdateDocumentRequest,
) -> IndexResult<UpdateOutcome> {
    let entry = locate(engine, folder, title).await?;
    let scope = engine.backlink_scope(folder);

    let target_title = request
        .new_title
        .as_deref()
        .map(|title| compose(title.trim()))
        .filter(|title| !title.is_empty())
        .or_else(|| declared_title(&request.content));
    if let Some(new_title) = target_title.filter(|new_title| *new_title != entry.title) {
        let (renamed, report) = rename::rename_document(
            engine,
            &entry.folder,
            &entry.title,
            &new_title,
            Some(request.content),
        )
        .await?;
        let document = project(engine, &renamed, true, scope).await?;
        return Ok(UpdateOutcome {
            document,
            cascade: Some(report),
        });
    }

    let entry = engine
        .locks()
        .with_lock(
            &folder_key(&entry.folder),
            write_locked(engine, entry.clone(), &request.content),
        )
        .await?;
    let document = project(engine, &entry, true, scope).await?;
    Ok(UpdateOutcome {
        document,
        cascade: None,
    })
}

async fn write_locked(
    engine: &IndexEngine,
    entry: CatalogEntry,
    content: &str,
) -> IndexResult<CatalogEntry> {
    let path = engine.folder_path(&entry.folder).join(&entry.filename);
    if !tokio::fs::try_exists(&path).await? {
        tracing::warn!(folder = %entry.folder, filename = %entry.filename, "cataloged file is gone; rebuilding");
        engine.refresh().await?;
        return Err(IndexError::NotFound {
            folder: entry.folder,
            title: entry.title,
        });
    }

    let content = with_title(content, &entry.title, &entry.filename);
    write_atomic(&path, &content).await?;

    let tags = parse_tags(&content);
    {
        let mut state = engine.state().write().await;
        state
            .catalog
            .set_tags(&entry.folder, &entry.title, tags.clone());
        state.tags.add_tags(&tags);
        state
            .graph
            .update_document(&entry.folder, &entry.title, &entry.filename, &content);
    }
    tracing::debug!(folder = %entry.folder, title = %entry.title, "document content updated");

    Ok(CatalogEntry { tags, ..entry })
}

/// Move to trash (or unlink when `permanent`), drop from catalog and graph,
/// then rescan tags.
pub(crate) async fn delete_document(
    engine: &IndexEngine,
    folder: Option<&str>,
    title: &str,
    permanent: bool,
) -> IndexResult<DeleteResult> {
    let located = locate(engine, folder, title).await?;
    let folder = located.folder.clone();

    let (entry, trash_filename) = engine
        .locks()
        .with_lock(&folder_key(&folder), async {
            let entry = engine
                .state()
                .read()
                .await
                .catalog
                .get_by_title(&folder, &located.title)
                .cloned()
                .ok_or_else(|| IndexError::NotFound {
                    folder: folder.clone(),
                    title: located.title.clone(),
                })?;

            let path = engine.folder_path(&folder).join(&entry.filename);
            let trash_filename = if permanent {
                tokio::fs::remove_file(&path).await?;
                None
            } else {
                Some(trash::move_to_trash(engine, &path, &entry.filename).await?)
            };

            let mut state = engine.state().write().await;
            state.catalog.remove_document(&folder, &entry.title);
            state.graph.remove_document(&folder, &entry.title);
            Ok::<_, IndexError>((entry, trash_filename))
        })
        .await?;

    engine.refresh_tags().await?;
    tracing::info!(folder = %folder, title = %entry.title, permanent, "document deleted");

    Ok(DeleteResult {
        title: entry.title,
        folder,
        trash_filename,
    })
}

/// Move a document into another folder. Its links now resolve against the
/// target folder.
pub(crate) async fn move_document(
    engine: &IndexEngine,
    folder: Option<&str>,
    title: &str,
    target_folder: &str,
) -> IndexResult<Document> {
    let entry = locate(engine, folder, title).await?;
    let target = engine.resolve_folder(Some(target_folder))?;
    let scope = engine.backlink_scope(Some(&target));
    if target == entry.folder {
        return project(engine, &entry, false, scope).await;
    }

    let keys = [folder_key(&entry.folder), folder_key(&target)];
    let moved = engine
        .locks()
        .with_locks(&keys, move_locked(engine, &entry, &target))
        .await?;
    project(engine, &moved, false, scope).await
}

async fn move_locked(
    engine: &IndexEngine,
    entry: &CatalogEntry,
    target: &str,
) -> IndexResult<CatalogEntry> {
    let current = {
        let state = engine.state().read().await;
        let current = state
            .catalog
            .get_by_title(&entry.folder, &entry.title)
            .cloned()
            .ok_or_else(|| IndexError::NotFound {
                folder: entry.folder.clone(),
                title: entry.title.clone(),
            })?;
        if state.catalog.has_title_in_folder(&current.title, target)? {
            return Err(IndexError::Collision {
                folder: target.to_string(),
                title: current.title,
            });
        }
        current
    };

    let dir = engine.folder_path(target);
    tokio::fs::create_dir_all(&dir).await?;
    let dest = dir.join(&current.filename);
    if tokio::fs::try_exists(&dest).await? {
        return Err(IndexError::FilenameCollision {
            folder: target.to_string(),
            filename: current.filename,
        });
    }
    let source = engine.folder_path(&current.folder).join(&current.filename);
    tokio::fs::rename(&source, &dest).await?;
    let content = tokio::fs::read_to_string(&dest).await?;

    let moved = CatalogEntry {
        folder: target.to_string(),
        ..current.clone()
    };
    {
        let mut state = engine.state().write().await;
        state.catalog.remove_document(&current.folder, &current.title);
        state.catalog.add_document(
            &moved.title,
            &moved.filename,
            &moved.folder,
            moved.tags.clone(),
        );
        state.graph.remove_document(&current.folder, &current.title);
        state
            .graph
            .add_document(&moved.folder, &moved.title, &moved.filename, &content);
    }
    tracing::info!(
        title = %moved.title,
        from = %current.folder,
        to = %moved.folder,
        "document moved"
    );
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_title_keeps_resolvable_content() {
        assert_eq!(with_title("# Note\nbody", "Note", "Note.md"), "# Note\nbody");
        assert_eq!(with_title("plain", "Note", "Note.md"), "plain");
    }

    #[test]
    fn with_title_pins_titles_the_filename_cannot_carry() {
        let content = with_title("plain", "A/B", "AB.md");
        assert_eq!(parse_document(&content, "AB").title, "A/B");
    }

    #[test]
    fn with_title_overrides_stale_declaration() {
        let content = with_title("---\ntitle: Old\n---\nbody", "New", "New.md");
        assert_eq!(declared_title(&content).as_deref(), Some("New"));
    }
}
