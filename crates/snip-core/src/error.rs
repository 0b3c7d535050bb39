use crate::record::ShortUrl;
use thiserror::Error;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The id is already taken by a live or soft-deleted record.
    #[error("short url id already exists: {}", .0.id)]
    NotUnique(Box<ShortUrl>),
    #[error("short url not found: {0}")]
    NotFound(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage i/o failed: {0}")]
    Io(String),
    #[error("storage file is corrupted at line {line}: {reason}")]
    Corrupted { line: usize, reason: String },
}

impl StorageError {
    pub fn not_unique(record: ShortUrl) -> Self {
        Self::NotUnique(Box::new(record))
    }

    /// Returns the record that collided, if this is a uniqueness violation.
    pub fn conflicting_record(&self) -> Option<&ShortUrl> {
        match self {
            Self::NotUnique(record) => Some(record),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
