use crate::error::Result;
use async_trait::async_trait;
use snip_core::{ShortUrl, Stats};

/// One entry of a batch shortening request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub correlation_id: String,
    pub original_url: String,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens `original_url` on behalf of `user_id`.
    ///
    /// Shortening a URL that is already stored fails with
    /// `ShortenerError::Conflict`, which still carries the short id.
    async fn shorten(&self, original_url: &str, user_id: &str) -> Result<ShortUrl>;

    /// Shortens every entry or none of them. Results keep the request order
    /// and correlation ids.
    async fn shorten_batch(&self, batch: Vec<BatchRequest>, user_id: &str)
        -> Result<Vec<ShortUrl>>;

    /// Resolves a short id. Deleted records fail with `ShortenerError::Gone`.
    async fn expand(&self, id: &str) -> Result<ShortUrl>;

    /// Every url created by `user_id`, deleted ones included.
    async fn urls_created_by(&self, user_id: &str) -> Result<Vec<ShortUrl>>;

    /// Schedules the deletion of `ids` owned by `user_id` and returns at once.
    fn delete_urls(&self, ids: Vec<String>, user_id: &str);

    async fn stats(&self) -> Result<Stats>;

    /// Probes the storage, bounded by a timeout.
    async fn health_check(&self) -> Result<()>;

    fn new_user_id(&self) -> String;

    /// Formats the public URL of a short id.
    fn format_short_url(&self, id: &str) -> String;
}
