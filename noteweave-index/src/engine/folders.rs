use std::collections::BTreeSet;

use crate::errors::{IndexError, IndexResult};
use crate::locks::folder_key;
use crate::models::{FolderDeleteResult, FolderSummary};
use crate::paths::validate_folder_name;
use crate::scan::{list_folder_dirs, scan_folder};

use super::IndexEngine;
use super::trash::move_to_trash;

/// Folders on disk plus any the catalog knows about, with document counts.
pub(crate) async fn list_folders(engine: &IndexEngine) -> IndexResult<Vec<FolderSummary>> {
    engine.initialize().await?;
    let mut names: BTreeSet<String> = list_folder_dirs(engine.root(), &engine.settings().trash_folder)
        .await?
        .into_iter()
        .collect();

    let state = engine.state().read().await;
    names.extend(state.catalog.folders());
    Ok(names
        .into_iter()
        .map(|name| FolderSummary {
            document_count: state.catalog.get_documents_by_folder(&name).len(),
            name,
        })
        .collect())
}

pub(crate) async fn create_folder(engine: &IndexEngine, name: &str) -> IndexResult<FolderSummary> {
    let name = checked_name(engine, name)?;
    let path = engine.folder_path(&name);
    if tokio::fs::try_exists(&path).await? {
        return Err(IndexError::FolderExists(name));
    }
    tokio::fs::create_dir_all(&path).await?;
    tracing::info!(folder = %name, "folder created");
    Ok(FolderSummary {
        name,
        document_count: 0,
    })
}

/// Delete a folder. A non-empty folder needs `force`, in which case every
/// document goes to the trash first and the directory is removed with
/// whatever non-document files it still holds.
pub(crate) async fn delete_folder(
    engine: &IndexEngine,
    name: &str,
    force: bool,
) -> IndexResult<FolderDeleteResult> {
    let name = checked_name(engine, name)?;
    if name == engine.settings().default_folder {
        return Err(IndexError::InvalidName(name));
    }
    engine.initialize().await?;

    let mut trashed = Vec::new();
    let outcome = engine
        .locks()
        .with_lock(&folder_key(&name), async {
            let path = engine.folder_path(&name);
            if !tokio::fs::try_exists(&path).await? {
                return Err(IndexError::FolderNotFound(name.clone()));
            }

            let documents = scan_folder(engine.root(), &name).await?;
            if !documents.is_empty() && !force {
                return Err(IndexError::FolderNotEmpty {
                    folder: name.clone(),
                    count: documents.len(),
                });
            }

            for doc in &documents {
                move_to_trash(engine, &path.join(&doc.filename), &doc.filename).await?;
                let mut state = engine.state().write().await;
                state.catalog.remove_document(&name, &doc.title);
                state.graph.remove_document(&name, &doc.title);
                trashed.push(doc.filename.clone());
            }

            // Attachments and hidden files are not documents; force takes them too.
            if force {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_dir(&path).await.map_err(|err| match err.kind() {
                    std::io::ErrorKind::DirectoryNotEmpty => IndexError::FolderNotEmpty {
                        folder: name.clone(),
                        count: 0,
                    },
                    _ => IndexError::Io(err),
                })?;
            }
            Ok::<_, IndexError>(())
        })
        .await;

    // Trashed documents are already out of the catalog even if the
    // directory removal failed.
    if !trashed.is_empty() {
        engine.refresh_tags().await?;
    }
    outcome?;

    tracing::info!(folder = %name, trashed = trashed.len(), "folder deleted");
    Ok(FolderDeleteResult {
        folder: name,
        trashed,
    })
}

fn checked_name(engine: &IndexEngine, name: &str) -> IndexResult<String> {
    let name = validate_folder_name(name)?;
    if name == engine.settings().trash_folder {
        return Err(IndexError::InvalidName(name.to_string()));
    }
    Ok(name.to_string())
}
