//! Core types and traits for the snip URL shortener.
//!
//! This crate holds the record model, the storage error taxonomy and the
//! repository contract shared by every storage backend and by the
//! shortener service.

pub mod error;
pub mod record;
pub mod repository;

pub use error::{Result, StorageError};
pub use record::{DeletionCandidate, ShortUrl, Stats};
pub use repository::{ReadRepository, Repository};
