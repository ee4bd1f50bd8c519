pub mod config;

pub use config::{
    BacklinkScope, Config, ConfigError, IndexSettings, LoggingSettings, NotesSettings,
    ServerSettings, Settings, SettingsError, load_dotenv,
};
