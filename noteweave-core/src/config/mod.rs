//! Configuration management for noteweave.
//!
//! Settings are read from a TOML file located at
//! `~/.config/noteweave/config.toml`:
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3210
//!
//! [logging]
//! level = "info"
//!
//! [notes]
//! default_folder = "default"
//! trash_folder = ".trash"
//! watch = false
//! ```
//!
//! Environment overrides:
//! - `NOTEWEAVE_CONFIG_DIR` - directory holding `config.toml`
//! - `NOTEWEAVE_DATA_DIR` - data directory (the notes root defaults to `<dir>/notes`)

pub mod notes;
mod settings;

pub use notes::{BacklinkScope, IndexSettings};
pub use settings::{LoggingSettings, NotesSettings, ServerSettings, Settings, SettingsError};

/// Loaded application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings loaded from the TOML configuration file
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Server port must be non-zero")]
    InvalidPort,
}

impl Config {
    /// Load configuration from `.env` and the settings file.
    pub fn load() -> Result<Self, ConfigError> {
        load_dotenv();
        let settings = Settings::load()?;
        Self::from_settings(settings)
    }

    /// Validate already-parsed settings.
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        if settings.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        Ok(Self { settings })
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        self.settings.bind_addr()
    }

    /// Resolved settings for the notes index.
    pub fn index_settings(&self) -> IndexSettings {
        IndexSettings::from(&self.settings.notes)
    }

    /// Configured log level.
    pub fn log_level(&self) -> &str {
        &self.settings.logging.level
    }
}

/// Load .env file if it exists (for development convenience).
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}
