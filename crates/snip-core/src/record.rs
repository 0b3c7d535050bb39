use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A shortened URL as stored by every repository backend.
///
/// The serialized field names are part of the on-disk format of the file
/// backend, so renaming them breaks existing storage files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortUrl {
    /// The original URL that was shortened.
    #[serde(rename = "url")]
    pub original_url: String,
    /// The short identifier, unique across live and deleted records.
    pub id: String,
    /// Opaque token of the caller that created the record.
    pub created_by: String,
    /// Client supplied tag used to match batch requests to their results.
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// When the record was soft-deleted, if ever.
    #[serde(default)]
    pub deleted_at: Option<Timestamp>,
}

impl ShortUrl {
    /// Creates a live record without a correlation id.
    pub fn new(
        original_url: impl Into<String>,
        id: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            original_url: original_url.into(),
            id: id.into(),
            created_by: created_by.into(),
            correlation_id: None,
            deleted_at: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Soft-deletes the record if `candidate` names it and its owner.
    ///
    /// Returns `false` without touching the record when the owner does not
    /// match or the record is already deleted.
    pub fn delete_if_owned(&mut self, candidate: &DeletionCandidate, at: Timestamp) -> bool {
        if self.id != candidate.id || self.created_by != candidate.created_by || self.is_deleted()
        {
            return false;
        }
        self.deleted_at = Some(at);
        true
    }

    /// Formats the public short URL under `base_url`.
    pub fn short_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.id)
    }
}

/// An `(id, owner)` pair submitted for soft deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeletionCandidate {
    pub id: String,
    pub created_by: String,
}

impl DeletionCandidate {
    pub fn new(id: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_by: created_by.into(),
        }
    }
}

/// Aggregate counters over every stored record, deleted ones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub urls: usize,
    pub users: usize,
}
