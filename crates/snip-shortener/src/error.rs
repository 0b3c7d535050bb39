use snip_core::{ShortUrl, StorageError};
use snip_generator::GeneratorError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    /// The id is already taken; carries the record that was rejected.
    #[error("url already shortened: {}", .0.id)]
    Conflict(Box<ShortUrl>),
    #[error("short url not found: {0}")]
    NotFound(String),
    #[error("short url was deleted: {0}")]
    Gone(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotUnique(record) => Self::Conflict(record),
            StorageError::NotFound(id) => Self::NotFound(id),
            other => Self::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShortenerError>;
