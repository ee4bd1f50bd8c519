#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("missing data directory")]
    MissingDataDir,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
    #[error("document catalog is not initialized")]
    NotReady,
    #[error("a document titled '{title}' already exists in folder '{folder}'")]
    Collision { folder: String, title: String },
    #[error("file '{filename}' already exists in folder '{folder}'")]
    FilenameCollision { folder: String, filename: String },
    #[error("no document titled '{title}' in folder '{folder}'")]
    NotFound { folder: String, title: String },
    #[error("folder not found: {0}")]
    FolderNotFound(String),
    #[error("folder '{folder}' is not empty ({count} documents)")]
    FolderNotEmpty { folder: String, count: usize },
    #[error("folder already exists: {0}")]
    FolderExists(String),
    #[error("trash item not found: {0}")]
    TrashItemNotFound(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
}

pub type IndexResult<T> = Result<T, IndexError>;
