use async_trait::async_trait;
use jiff::Timestamp;
use parking_lot::RwLock;
use snip_core::{
    DeletionCandidate, ReadRepository, Repository, Result, ShortUrl, Stats, StorageError,
};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// In-memory implementation of the repository contract.
///
/// The whole map sits behind one reader/writer lock so that a batch can be
/// checked and inserted as a single critical section. Nothing survives a
/// restart.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    storage: RwLock<HashMap<String, ShortUrl>>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.storage.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.read().is_empty()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get_by_id(&self, id: &str) -> Result<ShortUrl> {
        self.storage
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn get_users_urls(&self, user_id: &str) -> Result<Vec<ShortUrl>> {
        let storage = self.storage.read();
        Ok(storage
            .values()
            .filter(|url| url.created_by == user_id)
            .cloned()
            .collect())
    }

    async fn get_users_and_urls_count(&self) -> Result<Stats> {
        let storage = self.storage.read();
        let users: HashSet<&str> = storage.values().map(|url| url.created_by.as_str()).collect();
        Ok(Stats {
            urls: storage.len(),
            users: users.len(),
        })
    }

    async fn check(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save(&self, url: ShortUrl) -> Result<()> {
        let mut storage = self.storage.write();
        if storage.contains_key(&url.id) {
            return Err(StorageError::not_unique(url));
        }

        trace!(id = %url.id, "storing short url");
        storage.insert(url.id.clone(), url);
        Ok(())
    }

    async fn save_batch(&self, batch: Vec<ShortUrl>) -> Result<()> {
        let mut storage = self.storage.write();

        let mut seen = HashSet::with_capacity(batch.len());
        if let Some(conflict) = batch
            .iter()
            .find(|url| storage.contains_key(&url.id) || !seen.insert(url.id.as_str()))
        {
            return Err(StorageError::not_unique(conflict.clone()));
        }

        trace!(count = batch.len(), "storing short url batch");
        storage.extend(batch.into_iter().map(|url| (url.id.clone(), url)));
        Ok(())
    }

    async fn delete_urls(&self, urls: &[DeletionCandidate]) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        let now = Timestamp::now();
        let mut storage = self.storage.write();
        for candidate in urls {
            if let Some(url) = storage.get_mut(&candidate.id) {
                url.delete_if_owned(candidate, now);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.storage.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(url: &str, id: &str, owner: &str) -> ShortUrl {
        ShortUrl::new(url, id, owner)
    }

    #[tokio::test]
    async fn save_and_get() {
        let repo = InMemoryRepository::new();
        let saved = record("https://example.com", "abc123", "u1");

        repo.save(saved.clone()).await.unwrap();

        let result = repo.get_by_id("abc123").await.unwrap();
        assert_eq!(result, saved);
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let repo = InMemoryRepository::new();

        let err = repo.get_by_id("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn save_conflict_keeps_original() {
        let repo = InMemoryRepository::new();
        repo.save(record("https://example.com", "abc123", "u1"))
            .await
            .unwrap();

        let err = repo
            .save(record("https://other.com", "abc123", "u2"))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::NotUnique(_)));
        assert_eq!(
            err.conflicting_record().unwrap().original_url,
            "https://other.com"
        );
        assert_eq!(
            repo.get_by_id("abc123").await.unwrap().original_url,
            "https://example.com"
        );
    }

    #[tokio::test]
    async fn save_conflicts_with_deleted_record() {
        let repo = InMemoryRepository::new();
        repo.save(record("https://example.com", "abc123", "u1"))
            .await
            .unwrap();
        repo.delete_urls(&[DeletionCandidate::new("abc123", "u1")])
            .await
            .unwrap();

        let err = repo
            .save(record("https://example.com", "abc123", "u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotUnique(_)));
    }

    #[tokio::test]
    async fn batch_is_rejected_as_a_whole() {
        let repo = InMemoryRepository::new();
        repo.save(record("https://taken.com", "taken", "u1"))
            .await
            .unwrap();

        let err = repo
            .save_batch(vec![
                record("https://fresh.com", "fresh", "u1"),
                record("https://taken.com", "taken", "u1"),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.conflicting_record().unwrap().id, "taken");
        assert!(matches!(
            repo.get_by_id("fresh").await,
            Err(StorageError::NotFound(_))
        ));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn batch_with_internal_duplicate_is_rejected() {
        let repo = InMemoryRepository::new();

        let err = repo
            .save_batch(vec![
                record("https://a.com", "same", "u1"),
                record("https://b.com", "same", "u1"),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::NotUnique(_)));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn batch_saves_everything() {
        let repo = InMemoryRepository::new();

        repo.save_batch(vec![
            record("https://a.com", "a", "u1").with_correlation_id("1"),
            record("https://b.com", "b", "u1").with_correlation_id("2"),
        ])
        .await
        .unwrap();

        let b = repo.get_by_id("b").await.unwrap();
        assert_eq!(b.correlation_id.as_deref(), Some("2"));
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn users_urls_include_deleted() {
        let repo = InMemoryRepository::new();
        repo.save(record("https://a.com", "a", "u1")).await.unwrap();
        repo.save(record("https://b.com", "b", "u1")).await.unwrap();
        repo.save(record("https://c.com", "c", "u2")).await.unwrap();
        repo.delete_urls(&[DeletionCandidate::new("a", "u1")])
            .await
            .unwrap();

        let mut ids: Vec<String> = repo
            .get_users_urls("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|url| url.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(repo.get_users_urls("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_scoped_to_owner() {
        let repo = InMemoryRepository::new();
        repo.save(record("https://a.com", "a", "u1")).await.unwrap();

        repo.delete_urls(&[
            DeletionCandidate::new("a", "intruder"),
            DeletionCandidate::new("missing", "u1"),
        ])
        .await
        .unwrap();
        assert!(!repo.get_by_id("a").await.unwrap().is_deleted());

        repo.delete_urls(&[DeletionCandidate::new("a", "u1")])
            .await
            .unwrap();
        assert!(repo.get_by_id("a").await.unwrap().is_deleted());
    }

    #[tokio::test]
    async fn empty_delete_is_noop() {
        let repo = InMemoryRepository::new();
        repo.save(record("https://a.com", "a", "u1")).await.unwrap();

        repo.delete_urls(&[]).await.unwrap();

        assert!(!repo.get_by_id("a").await.unwrap().is_deleted());
    }

    #[tokio::test]
    async fn stats_count_deleted_records() {
        let repo = InMemoryRepository::new();
        repo.save(record("https://a.com", "a", "u1")).await.unwrap();
        repo.save(record("https://b.com", "b", "u1")).await.unwrap();
        repo.save(record("https://c.com", "c", "u2")).await.unwrap();
        repo.delete_urls(&[DeletionCandidate::new("c", "u2")])
            .await
            .unwrap();

        let stats = repo.get_users_and_urls_count().await.unwrap();
        assert_eq!(stats, Stats { urls: 3, users: 2 });
    }

    #[tokio::test]
    async fn close_clears_contents() {
        let repo = InMemoryRepository::new();
        repo.save(record("https://a.com", "a", "u1")).await.unwrap();

        repo.check().await.unwrap();
        repo.close().await.unwrap();

        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn concurrent_access() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..10u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let url = ShortUrl::new(
                    format!("https://example{}.com", i),
                    format!("code-{:03}", i),
                    "u1",
                );
                repo.save(url).await.unwrap();
            }));
        }

        for i in 0..10u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let _ = repo.get_by_id(&format!("code-{:03}", i)).await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..10u64 {
            let result = repo.get_by_id(&format!("code-{:03}", i)).await.unwrap();
            assert_eq!(result.original_url, format!("https://example{}.com", i));
        }
    }

    #[tokio::test]
    async fn concurrent_batches_never_share_an_id() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for owner in 0..8 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.save_batch(vec![
                    ShortUrl::new("https://a.com", "shared", format!("u{owner}")),
                    ShortUrl::new("https://b.com", format!("own-{owner}"), format!("u{owner}")),
                ])
                .await
                .is_ok()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(repo.len(), 2);
    }
}
