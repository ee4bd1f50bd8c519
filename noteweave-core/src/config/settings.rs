//! Settings configuration loaded from TOML files.
//!
//! This module handles the configuration stored in TOML format in the XDG
//! config directory (~/.config/noteweave/config.toml).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default TOML configuration file content
const DEFAULT_CONFIG_TOML: &str = r#"# noteweave configuration file
# Located at: ~/.config/noteweave/config.toml

[server]
host = "127.0.0.1"
port = 3210

[logging]
level = "info"

[notes]
# root = "/home/me/notes"  # Defaults to <data dir>/noteweave/notes
default_folder = "default"
trash_folder = ".trash"
trash_retention_days = 30
# Watch the notes root for edits made outside the application
watch = false
watch_debounce_ms = 300
# "folder" computes backlinks per folder, "global" across every folder
backlink_scope = "folder"
"#;

/// Settings loaded from TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Notes store configuration
    #[serde(default)]
    pub notes: NotesSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Notes store configuration as written by the user.
///
/// Every field is optional; `IndexSettings` fills in the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotesSettings {
    /// Notes root directory
    pub root: Option<String>,

    /// Folder used for documents created without one
    pub default_folder: Option<String>,

    /// Reserved folder holding soft-deleted documents
    pub trash_folder: Option<String>,

    /// Days a trashed document is kept before purge
    pub trash_retention_days: Option<u32>,

    /// Watch the notes root for external edits
    pub watch: Option<bool>,

    /// Debounce window for watcher events
    pub watch_debounce_ms: Option<u64>,

    /// Backlink scope: "folder" or "global"
    pub backlink_scope: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3210
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Get the configuration file path.
    ///
    /// Uses XDG config directory: `~/.config/noteweave/config.toml`
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("NOTEWEAVE_CONFIG_DIR") {
            let dir = PathBuf::from(override_dir);
            return Ok(dir.join("config.toml"));
        }

        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("noteweave");

        Ok(config_dir.join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG_TOML)?;
        Ok(())
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
