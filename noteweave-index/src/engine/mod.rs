use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, RwLock};

use crate::catalog::DocumentCatalog;
use crate::errors::{IndexError, IndexResult};
use crate::graph::LinkGraph;
use crate::locks::LockManager;
use crate::models::{
    CreateDocumentRequest, DeleteResult, Document, FolderDeleteResult, FolderSummary,
    GraphSnapshot, TrashItem, UpdateDocumentRequest, UpdateOutcome,
};
use crate::normalize::compose;
use crate::paths::{notes_root, validate_folder_name};
use crate::scan::{ScannedDocument, scan_notes};
use crate::tags::TagUniverse;
use crate::{BacklinkScope, IndexSettings};

pub(crate) mod documents;
pub(crate) mod folders;
pub(crate) mod rename;
pub(crate) mod trash;

/// The three derived caches. Only ever touched under the engine's `RwLock`,
/// and never across a filesystem call.
#[derive(Debug, Default)]
pub(crate) struct IndexState {
    pub(crate) catalog: DocumentCatalog,
    pub(crate) tags: TagUniverse,
    pub(crate) graph: LinkGraph,
}

/// Document index and graph cache over a notes root.
///
/// Starts uninitialized; [`IndexEngine::initialize`] scans the root once and
/// [`IndexEngine::refresh`] rebuilds everything from disk on demand.
#[derive(Debug)]
pub struct IndexEngine {
    settings: IndexSettings,
    root: PathBuf,
    state: RwLock<IndexState>,
    init_gate: Mutex<()>,
    locks: LockManager,
}

impl IndexEngine {
    /// Resolve the notes root and make sure it and the default folder exist.
    pub async fn open(settings: IndexSettings) -> IndexResult<Self> {
        let root = notes_root(&settings)?;
        tokio::fs::create_dir_all(root.join(&settings.default_folder)).await?;
        Ok(Self {
            settings,
            root,
            state: RwLock::new(IndexState::default()),
            init_gate: Mutex::new(()),
            locks: LockManager::new(),
        })
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn folder_path(&self, folder: &str) -> PathBuf {
        self.root.join(folder)
    }

    pub(crate) fn trash_path(&self) -> PathBuf {
        self.root.join(&self.settings.trash_folder)
    }

    pub(crate) fn state(&self) -> &RwLock<IndexState> {
        &self.state
    }

    pub(crate) fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub async fn is_ready(&self) -> bool {
        self.state.read().await.catalog.is_ready()
    }

    /// Build the caches from disk unless that already happened.
    pub async fn initialize(&self) -> IndexResult<()> {
        if self.is_ready().await {
            return Ok(());
        }
        let _gate = self.init_gate.lock().await;
        if self.is_ready().await {
            return Ok(());
        }
        self.refresh().await
    }

    /// Full rebuild of catalog, tags and graph from disk.
    pub async fn refresh(&self) -> IndexResult<()> {
        let documents = scan_notes(&self.root, &self.settings.trash_folder).await?;
        self.rebuild_from(&documents).await;
        Ok(())
    }

    pub(crate) async fn rebuild_from(&self, documents: &[ScannedDocument]) {
        let mut state = self.state.write().await;
        let skipped = state
            .catalog
            .rebuild(documents.iter().map(ScannedDocument::catalog_entry));
        for entry in &skipped {
            tracing::warn!(
                folder = %entry.folder,
                filename = %entry.filename,
                "duplicate title '{}' ignored",
                entry.title
            );
        }
        state
            .tags
            .replace(documents.iter().flat_map(|doc| doc.tags.iter()));
        state
            .graph
            .rebuild(documents.iter().map(ScannedDocument::graph_source));
        tracing::info!(
            documents = state.catalog.len(),
            duplicates = skipped.len(),
            "document index rebuilt"
        );
    }

    /// Replace the tag universe from a rescan of every document.
    pub async fn refresh_tags(&self) -> IndexResult<()> {
        let documents = scan_notes(&self.root, &self.settings.trash_folder).await?;
        let mut state = self.state.write().await;
        state
            .tags
            .replace(documents.iter().flat_map(|doc| doc.tags.iter()));
        Ok(())
    }

    pub async fn get_tags(&self) -> IndexResult<Vec<String>> {
        self.initialize().await?;
        Ok(self.state.read().await.tags.get_tags())
    }

    /// Render-ready graph snapshot, optionally rebuilt from disk first.
    pub async fn get_graph(&self, refresh: bool) -> IndexResult<GraphSnapshot> {
        if refresh {
            self.refresh().await?;
        } else {
            self.initialize().await?;
        }
        Ok(self.state.read().await.graph.get_graph())
    }

    /// Folder a request targets: the default folder when unspecified.
    pub(crate) fn resolve_folder(&self, folder: Option<&str>) -> IndexResult<String> {
        let Some(folder) = folder.map(str::trim).filter(|f| !f.is_empty()) else {
            return Ok(self.settings.default_folder.clone());
        };
        let folder = validate_folder_name(folder)?;
        if folder == self.settings.trash_folder {
            return Err(IndexError::InvalidName(folder.to_string()));
        }
        Ok(folder.to_string())
    }

    pub(crate) fn backlink_scope(&self, folder: Option<&str>) -> BacklinkScope {
        match folder {
            None => BacklinkScope::Global,
            Some(_) => self.settings.backlink_scope,
        }
    }

    pub async fn create_document(&self, request: CreateDocumentRequest) -> IndexResult<Document> {
        documents::create_document(self, request).await
    }

    /// Single document with content. Without a folder, any folder's document
    /// with that title is found (the default folder first).
    pub async fn get_document(&self, folder: Option<&str>, title: &str) -> IndexResult<Document> {
        documents::get_document(self, folder, title).await
    }

    /// Documents of one folder, or of every folder (with global backlinks)
    /// when `folder` is `None`.
    pub async fn list_documents(&self, folder: Option<&str>) -> IndexResult<Vec<Document>> {
        documents::list_documents(self, folder).await
    }

    /// Titles from the catalog, for autocomplete.
    pub async fn list_titles(&self, folder: Option<&str>) -> IndexResult<Vec<String>> {
        documents::list_titles(self, folder).await
    }

    pub async fn update_document(
        &self,
        folder: Option<&str>,
        title: &str,
        request: UpdateDocumentRequest,
    ) -> IndexResult<UpdateOutcome> {
        documents::update_document(self, folder, title, request).await
    }

    /// Rename a document, rewriting every same-folder link to it.
    pub async fn rename_document(
        &self,
        folder: Option<&str>,
        title: &str,
        new_title: &str,
    ) -> IndexResult<UpdateOutcome> {
        let folder = self.resolve_folder(folder)?;
        let new_title = compose(new_title.trim());
        let (entry, report) = rename::rename_document(self, &folder, title, &new_title, None).await?;
        let document =
            documents::project(self, &entry, false, self.backlink_scope(Some(&folder))).await?;
        Ok(UpdateOutcome {
            document,
            cascade: Some(report),
        })
    }

    pub async fn delete_document(
        &self,
        folder: Option<&str>,
        title: &str,
        permanent: bool,
    ) -> IndexResult<DeleteResult> {
        documents::delete_document(self, folder, title, permanent).await
    }

    pub async fn move_document(
        &self,
        folder: Option<&str>,
        title: &str,
        target_folder: &str,
    ) -> IndexResult<Document> {
        documents::move_document(self, folder, title, target_folder).await
    }

    pub async fn list_folders(&self) -> IndexResult<Vec<FolderSummary>> {
        folders::list_folders(self).await
    }

    pub async fn create_folder(&self, name: &str) -> IndexResult<FolderSummary> {
        folders::create_folder(self, name).await
    }

    pub async fn delete_folder(&self, name: &str, force: bool) -> IndexResult<FolderDeleteResult> {
        folders::delete_folder(self, name, force).await
    }

    pub async fn list_trash(&self) -> IndexResult<Vec<TrashItem>> {
        trash::list_trash(self).await
    }

    pub async fn restore_from_trash(
        &self,
        filename: &str,
        folder: Option<&str>,
    ) -> IndexResult<Document> {
        trash::restore(self, filename, folder).await
    }

    pub async fn delete_from_trash(&self, filename: &str) -> IndexResult<()> {
        trash::delete_permanently(self, filename).await
    }

    /// Permanently delete trash items past the retention window.
    pub async fn purge_trash(&self) -> IndexResult<Vec<String>> {
        trash::purge_expired(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn engine() -> (IndexEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = IndexSettings {
            root_override: Some(dir.path().to_path_buf()),
            ..IndexSettings::default()
        };
        (IndexEngine::open(settings).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn open_creates_default_folder_but_stays_uninitialized() {
        let (engine, dir) = engine().await;
        assert!(dir.path().join("default").is_dir());
        assert!(!engine.is_ready().await);

        engine.initialize().await.unwrap();
        assert!(engine.is_ready().await);
    }

    #[tokio::test]
    async fn resolve_folder_rules() {
        let (engine, _dir) = engine().await;
        assert_eq!(engine.resolve_folder(None).unwrap(), "default");
        assert_eq!(engine.resolve_folder(Some("  ")).unwrap(), "default");
        assert_eq!(engine.resolve_folder(Some(" work ")).unwrap(), "work");
        assert!(matches!(
            engine.resolve_folder(Some(".trash")),
            Err(IndexError::InvalidName(_))
        ));
        assert!(engine.resolve_folder(Some("a/b")).is_err());
    }
}
