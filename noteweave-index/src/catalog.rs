//! Title/filename/folder catalog.
//!
//! Built once from a folder scan, then patched in place. Every operation is a
//! synchronous map mutation; callers gating writes on collision checks must
//! go through the `IndexResult`-returning lookups, which refuse to answer
//! before the catalog has been built.

use std::collections::{BTreeSet, HashMap};

use crate::errors::{IndexError, IndexResult};
use crate::models::{CatalogEntry, DocKey};
use crate::normalize::normalize;

#[derive(Debug, Default)]
pub struct DocumentCatalog {
    ready: bool,
    entries: HashMap<DocKey, CatalogEntry>,
}

impl DocumentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Replace the whole catalog. Entries whose title repeats within a folder
    /// are skipped (first one wins) and returned to the caller.
    pub fn rebuild<I>(&mut self, entries: I) -> Vec<CatalogEntry>
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        self.entries.clear();
        let mut skipped = Vec::new();
        for entry in entries {
            let key = DocKey::new(&entry.folder, &entry.title);
            if self.entries.contains_key(&key) {
                skipped.push(entry);
                continue;
            }
            self.entries.insert(key, entry);
        }
        self.ready = true;
        skipped
    }

    /// Folder-scoped duplicate check.
    pub fn has_title_in_folder(&self, title: &str, folder: &str) -> IndexResult<bool> {
        self.ensure_ready()?;
        Ok(self.entries.contains_key(&DocKey::new(folder, title)))
    }

    /// Global duplicate check for the legacy flat surface.
    pub fn has_title(&self, title: &str) -> IndexResult<bool> {
        self.ensure_ready()?;
        let key = normalize(title);
        Ok(self.entries.keys().any(|k| k.title == key))
    }

    pub fn add_document(&mut self, title: &str, filename: &str, folder: &str, tags: Vec<String>) {
        self.entries.insert(
            DocKey::new(folder, title),
            CatalogEntry {
                title: title.to_string(),
                filename: filename.to_string(),
                folder: folder.to_string(),
                tags,
            },
        );
    }

    pub fn remove_document(&mut self, folder: &str, title: &str) -> Option<CatalogEntry> {
        self.entries.remove(&DocKey::new(folder, title))
    }

    /// Rename primitive: the key itself changes, so the old key is removed and
    /// the entry re-inserted under the new one. Returns `false` when `old_title`
    /// is unknown.
    pub fn update_document(
        &mut self,
        folder: &str,
        old_title: &str,
        new_title: &str,
        new_filename: &str,
    ) -> bool {
        let Some(mut entry) = self.entries.remove(&DocKey::new(folder, old_title)) else {
            return false;
        };
        entry.title = new_title.to_string();
        entry.filename = new_filename.to_string();
        self.entries.insert(DocKey::new(folder, new_title), entry);
        true
    }

    pub fn set_tags(&mut self, folder: &str, title: &str, tags: Vec<String>) {
        if let Some(entry) = self.entries.get_mut(&DocKey::new(folder, title)) {
            entry.tags = tags;
        }
    }

    pub fn get_by_title(&self, folder: &str, title: &str) -> Option<&CatalogEntry> {
        self.entries.get(&DocKey::new(folder, title))
    }

    /// Every folder's document with this title.
    pub fn find_title(&self, title: &str) -> Vec<&CatalogEntry> {
        let key = normalize(title);
        let mut found: Vec<&CatalogEntry> = self
            .entries
            .iter()
            .filter(|(k, _)| k.title == key)
            .map(|(_, entry)| entry)
            .collect();
        found.sort_by(|a, b| a.folder.cmp(&b.folder));
        found
    }

    pub fn get_by_filename(&self, folder: &str, filename: &str) -> Option<&CatalogEntry> {
        self.entries
            .values()
            .find(|entry| entry.folder == folder && entry.filename == filename)
    }

    /// All entries ordered by folder, then title.
    pub fn get_documents(&self) -> Vec<&CatalogEntry> {
        let mut docs: Vec<&CatalogEntry> = self.entries.values().collect();
        docs.sort_by(|a, b| {
            (a.folder.as_str(), normalize(&a.title)).cmp(&(b.folder.as_str(), normalize(&b.title)))
        });
        docs
    }

    pub fn get_documents_by_folder(&self, folder: &str) -> Vec<&CatalogEntry> {
        let mut docs: Vec<&CatalogEntry> = self
            .entries
            .iter()
            .filter(|(key, _)| key.folder == folder)
            .map(|(_, entry)| entry)
            .collect();
        docs.sort_by_key(|entry| normalize(&entry.title));
        docs
    }

    pub fn folders(&self) -> BTreeSet<String> {
        self.entries.keys().map(|key| key.folder.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_ready(&self) -> IndexResult<()> {
        if self.ready {
            Ok(())
        } else {
            Err(IndexError::NotReady)
        }
    }
}
