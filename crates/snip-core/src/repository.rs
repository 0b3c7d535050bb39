use crate::error::Result;
use crate::record::{DeletionCandidate, ShortUrl, Stats};
use async_trait::async_trait;

/// A read-only view of a repository.
///
/// Every lookup returns soft-deleted records as well; deciding whether a
/// deleted record is visible is left to the caller.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the record stored under `id`.
    /// Returns `Err(NotFound)` if no record, live or deleted, has this id.
    async fn get_by_id(&self, id: &str) -> Result<ShortUrl>;

    /// Returns every record created by `user_id`, deleted ones included.
    async fn get_users_urls(&self, user_id: &str) -> Result<Vec<ShortUrl>>;

    /// Counts stored records and distinct owners.
    async fn get_users_and_urls_count(&self) -> Result<Stats>;

    /// Liveness probe of the underlying storage.
    async fn check(&self) -> Result<()>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new record. Returns `Err(NotUnique)` if the id already exists,
    /// even when the existing record is soft-deleted.
    async fn save(&self, url: ShortUrl) -> Result<()>;

    /// Inserts all records or none of them.
    ///
    /// A collision with a stored record, or between two records of the batch,
    /// rejects the whole batch with `Err(NotUnique)`.
    async fn save_batch(&self, batch: Vec<ShortUrl>) -> Result<()>;

    /// Soft-deletes every live record whose id and owner match a candidate.
    ///
    /// Candidates naming a missing id or a different owner are skipped
    /// silently; an empty slice is a no-op.
    async fn delete_urls(&self, urls: &[DeletionCandidate]) -> Result<()>;

    /// Releases the resources held by the backend.
    async fn close(&self) -> Result<()>;
}
