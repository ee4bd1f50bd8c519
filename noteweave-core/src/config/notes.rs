//! Notes index configuration types.
//!
//! These types define the resolved (non-optional) settings used by
//! `noteweave-index`. They are created from the user-facing `NotesSettings`
//! TOML struct via `From`.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::settings::NotesSettings;

/// Which documents contribute to a document's backlinks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BacklinkScope {
    /// Only documents in the same folder (canonical).
    #[default]
    Folder,
    /// Every document regardless of folder (legacy flat mode).
    Global,
}

impl FromStr for BacklinkScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "folder" => Ok(Self::Folder),
            "global" => Ok(Self::Global),
            other => Err(format!("unknown backlink scope: {other}")),
        }
    }
}

/// Resolved notes index settings (all values filled with defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Override the notes root. When unset the root derives from
    /// `NOTEWEAVE_DATA_DIR` / XDG data dir.
    #[serde(default)]
    pub root_override: Option<PathBuf>,
    #[serde(default = "default_folder")]
    pub default_folder: String,
    #[serde(default = "default_trash_folder")]
    pub trash_folder: String,
    #[serde(default = "default_trash_retention_days")]
    pub trash_retention_days: u32,
    #[serde(default)]
    pub watch: bool,
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
    #[serde(default)]
    pub backlink_scope: BacklinkScope,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            root_override: None,
            default_folder: default_folder(),
            trash_folder: default_trash_folder(),
            trash_retention_days: default_trash_retention_days(),
            watch: false,
            watch_debounce_ms: default_watch_debounce_ms(),
            backlink_scope: BacklinkScope::default(),
        }
    }
}

fn default_folder() -> String {
    "default".to_string()
}

fn default_trash_folder() -> String {
    ".trash".to_string()
}

fn default_trash_retention_days() -> u32 {
    30
}

fn default_watch_debounce_ms() -> u64 {
    300
}

impl From<&NotesSettings> for IndexSettings {
    fn from(value: &NotesSettings) -> Self {
        let mut settings = IndexSettings::default();
        if let Some(root) = &value.root {
            settings.root_override = Some(PathBuf::from(root));
        }
        if let Some(folder) = value.default_folder.as_deref().map(str::trim) {
            if !folder.is_empty() {
                settings.default_folder = folder.to_string();
            }
        }
        if let Some(folder) = value.trash_folder.as_deref().map(str::trim) {
            if !folder.is_empty() {
                settings.trash_folder = folder.to_string();
            }
        }
        if let Some(days) = value.trash_retention_days {
            settings.trash_retention_days = days;
        }
        if let Some(watch) = value.watch {
            settings.watch = watch;
        }
        if let Some(ms) = value.watch_debounce_ms {
            settings.watch_debounce_ms = ms;
        }
        if let Some(scope) = &value.backlink_scope {
            match scope.parse() {
                Ok(scope) => settings.backlink_scope = scope,
                Err(err) => tracing::warn!("{err}; falling back to folder scope"),
            }
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_when_unset() {
        let settings = IndexSettings::from(&NotesSettings::default());

        assert!(settings.root_override.is_none());
        assert_eq!(settings.default_folder, "default");
        assert_eq!(settings.trash_folder, ".trash");
        assert_eq!(settings.trash_retention_days, 30);
        assert!(!settings.watch);
        assert_eq!(settings.backlink_scope, BacklinkScope::Folder);
    }

    #[test]
    fn test_overrides_applied() {
        let notes = NotesSettings {
            root: Some("/srv/notes".to_string()),
            default_folder: Some("inbox".to_string()),
            trash_folder: Some("  ".to_string()),
            trash_retention_days: Some(7),
            watch: Some(true),
            watch_debounce_ms: Some(50),
            backlink_scope: Some("Global".to_string()),
        };
        let settings = IndexSettings::from(&notes);

        assert_eq!(settings.root_override, Some(PathBuf::from("/srv/notes")));
        assert_eq!(settings.default_folder, "inbox");
        assert_eq!(settings.trash_folder, ".trash");
        assert_eq!(settings.trash_retention_days, 7);
        assert!(settings.watch);
        assert_eq!(settings.watch_debounce_ms, 50);
        assert_eq!(settings.backlink_scope, BacklinkScope::Global);
    }

    #[test]
    fn test_unknown_backlink_scope_falls_back() {
        let notes = NotesSettings {
            backlink_scope: Some("galaxy".to_string()),
            ..Default::default()
        };
        assert_eq!(IndexSettings::from(&notes).backlink_scope, BacklinkScope::Folder);
    }
}
