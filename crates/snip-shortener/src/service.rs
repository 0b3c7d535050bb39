use crate::deletion::DeletionPipeline;
use crate::error::{Result, ShortenerError};
use crate::shortener::{BatchRequest, Shortener};
use async_trait::async_trait;
use snip_core::{Repository, ShortUrl, Stats, StorageError};
use snip_generator::{Generator, UserIdGenerator, UuidGenerator};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// A concrete implementation of the `Shortener` trait.
///
/// Ids are derived from the URL by the `Generator`, so the repository's
/// uniqueness check doubles as "already shortened" detection. No collision
/// retry is performed.
pub struct ShortenerService<R: ?Sized, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    users: Arc<dyn UserIdGenerator>,
    deletion: DeletionPipeline<R>,
    base_url: String,
}

impl<R: Repository + ?Sized, G: Generator> ShortenerService<R, G> {
    /// Creates a service that issues UUID user ids and formats short URLs
    /// under `base_url`.
    pub fn new(repository: Arc<R>, generator: G, base_url: impl Into<String>) -> Self {
        Self {
            deletion: DeletionPipeline::new(Arc::clone(&repository)),
            repository,
            generator: Arc::new(generator),
            users: Arc::new(UuidGenerator),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_user_ids(mut self, users: impl UserIdGenerator) -> Self {
        self.users = Arc::new(users);
        self
    }

    pub fn with_deletion_pipeline(mut self, deletion: DeletionPipeline<R>) -> Self {
        self.deletion = deletion;
        self
    }

    fn validate_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }
        // must survive as a Location header on redirect
        if url.chars().any(char::is_control) {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot contain control characters".to_string(),
            ));
        }
        Ok(())
    }

    fn record_for(&self, original_url: &str, user_id: &str) -> Result<ShortUrl> {
        Self::validate_url(original_url)?;
        let id = self.generator.generate_id(original_url)?;
        Ok(ShortUrl::new(original_url, id, user_id))
    }
}

#[async_trait]
impl<R: Repository + ?Sized, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, original_url: &str, user_id: &str) -> Result<ShortUrl> {
        let record = self.record_for(original_url, user_id)?;
        trace!(id = %record.id, "shortening url");

        self.repository.save(record.clone()).await?;
        Ok(record)
    }

    async fn shorten_batch(
        &self,
        batch: Vec<BatchRequest>,
        user_id: &str,
    ) -> Result<Vec<ShortUrl>> {
        let records = batch
            .into_iter()
            .map(|request| {
                self.record_for(&request.original_url, user_id)
                    .map(|record| record.with_correlation_id(request.correlation_id))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(count = records.len(), "shortening url batch");

        self.repository.save_batch(records.clone()).await?;
        Ok(records)
    }

    async fn expand(&self, id: &str) -> Result<ShortUrl> {
        let record = self.repository.get_by_id(id).await?;
        if record.is_deleted() {
            return Err(ShortenerError::Gone(record.id));
        }
        Ok(record)
    }

    async fn urls_created_by(&self, user_id: &str) -> Result<Vec<ShortUrl>> {
        Ok(self.repository.get_users_urls(user_id).await?)
    }

    fn delete_urls(&self, ids: Vec<String>, user_id: &str) {
        debug!(count = ids.len(), user_id, "scheduling url deletion");
        self.deletion.spawn(ids, user_id.to_string());
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(self.repository.get_users_and_urls_count().await?)
    }

    async fn health_check(&self) -> Result<()> {
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, self.repository.check()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ShortenerError::Storage(StorageError::Timeout(format!(
                "storage check exceeded {}s",
                HEALTH_CHECK_TIMEOUT.as_secs()
            )))),
        }
    }

    fn new_user_id(&self) -> String {
        self.users.new_user_id()
    }

    fn format_short_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_core::ReadRepository;
    use snip_generator::HashGenerator;
    use snip_storage::InMemoryRepository;

    const BASE_URL: &str = "http://localhost:8080";

    fn test_service() -> (
        Arc<InMemoryRepository>,
        ShortenerService<InMemoryRepository, HashGenerator>,
    ) {
        let repo = Arc::new(InMemoryRepository::new());
        let service = ShortenerService::new(Arc::clone(&repo), HashGenerator, BASE_URL);
        (repo, service)
    }

    struct FixedUser;

    impl UserIdGenerator for FixedUser {
        fn new_user_id(&self) -> String {
            "fixed".to_string()
        }
    }

    #[tokio::test]
    async fn shorten_derives_id_from_url() {
        let (_, service) = test_service();

        let record = service.shorten("https://yandex.ru", "u1").await.unwrap();

        assert_eq!(record.id, "9vnMM4Hf4Os");
        assert_eq!(record.created_by, "u1");
        assert_eq!(
            service.format_short_url(&record.id),
            "http://localhost:8080/9vnMM4Hf4Os"
        );
    }

    #[tokio::test]
    async fn shorten_twice_conflicts_with_same_id() {
        let (_, service) = test_service();
        let first = service.shorten("https://example.com", "u1").await.unwrap();

        let err = service
            .shorten("https://example.com", "u2")
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::Conflict(record) if record.id == first.id));
    }

    #[tokio::test]
    async fn shorten_rejects_empty_url() {
        let (repo, service) = test_service();

        let err = service.shorten("  ", "u1").await.unwrap_err();

        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn shorten_rejects_control_characters() {
        let (repo, service) = test_service();

        let err = service
            .shorten("https://example.com/\nSet-Cookie: x=1", "u1")
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn batch_keeps_order_and_correlation_ids() {
        let (_, service) = test_service();

        let records = service
            .shorten_batch(
                vec![
                    BatchRequest {
                        correlation_id: "1".to_string(),
                        original_url: "https://a.com".to_string(),
                    },
                    BatchRequest {
                        correlation_id: "2".to_string(),
                        original_url: "https://b.com".to_string(),
                    },
                ],
                "u1",
            )
            .await
            .unwrap();

        let correlation: Vec<_> = records
            .iter()
            .map(|record| record.correlation_id.as_deref())
            .collect();
        assert_eq!(correlation, vec![Some("1"), Some("2")]);
        assert!(records.iter().all(|record| record.created_by == "u1"));
    }

    #[tokio::test]
    async fn batch_with_taken_url_saves_nothing() {
        let (repo, service) = test_service();
        service.shorten("https://taken.com", "u1").await.unwrap();

        let err = service
            .shorten_batch(
                vec![
                    BatchRequest {
                        correlation_id: "1".to_string(),
                        original_url: "https://fresh.com".to_string(),
                    },
                    BatchRequest {
                        correlation_id: "2".to_string(),
                        original_url: "https://taken.com".to_string(),
                    },
                ],
                "u1",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::Conflict(_)));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn batch_with_empty_url_is_invalid() {
        let (repo, service) = test_service();

        let err = service
            .shorten_batch(
                vec![BatchRequest {
                    correlation_id: "1".to_string(),
                    original_url: String::new(),
                }],
                "u1",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn expand_reports_missing_and_deleted() {
        let (repo, service) = test_service();
        let record = service.shorten("https://example.com", "u1").await.unwrap();

        assert_eq!(
            service.expand(&record.id).await.unwrap().original_url,
            "https://example.com"
        );
        assert!(matches!(
            service.expand("missing").await,
            Err(ShortenerError::NotFound(_))
        ));

        repo.delete_urls(&[snip_core::DeletionCandidate::new(record.id.clone(), "u1")])
            .await
            .unwrap();
        assert!(matches!(
            service.expand(&record.id).await,
            Err(ShortenerError::Gone(id)) if id == record.id
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_urls_runs_in_background() {
        let (repo, service) = test_service();
        let a = service.shorten("https://a.com", "u1").await.unwrap();
        let b = service.shorten("https://b.com", "u1").await.unwrap();
        let other = service.shorten("https://c.com", "u2").await.unwrap();

        service.delete_urls(vec![a.id.clone(), b.id.clone(), other.id.clone()], "u1");

        awaitility::at_most(Duration::from_secs(5))
            .poll_interval(Duration::from_millis(20))
            .until_async(|| async {
                let first = repo.get_by_id(&a.id).await.unwrap();
                let second = repo.get_by_id(&b.id).await.unwrap();
                first.is_deleted() && second.is_deleted()
            })
            .await;

        assert!(!repo.get_by_id(&other.id).await.unwrap().is_deleted());
    }

    #[tokio::test]
    async fn user_urls_and_stats() {
        let (_, service) = test_service();
        service.shorten("https://a.com", "u1").await.unwrap();
        service.shorten("https://b.com", "u1").await.unwrap();
        service.shorten("https://c.com", "u2").await.unwrap();

        assert_eq!(service.urls_created_by("u1").await.unwrap().len(), 2);
        assert!(service.urls_created_by("nobody").await.unwrap().is_empty());
        assert_eq!(service.stats().await.unwrap(), Stats { urls: 3, users: 2 });
    }

    #[tokio::test]
    async fn health_check_and_user_ids() {
        let (_, service) = test_service();
        service.health_check().await.unwrap();
        assert_ne!(service.new_user_id(), service.new_user_id());

        let service = service.with_user_ids(FixedUser);
        assert_eq!(service.new_user_id(), "fixed");
    }

    #[tokio::test]
    async fn trailing_slash_of_base_url_is_ignored() {
        let service = ShortenerService::new(
            Arc::new(InMemoryRepository::new()),
            HashGenerator,
            "http://short.example/",
        );
        assert_eq!(service.format_short_url("abc"), "http://short.example/abc");
    }

    #[tokio::test]
    async fn works_behind_a_trait_object() {
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let service: Arc<dyn Shortener> =
            Arc::new(ShortenerService::new(Arc::clone(&repo), HashGenerator, BASE_URL));

        let record = service.shorten("https://a.com", "u1").await.unwrap();
        assert_eq!(repo.get_by_id(&record.id).await.unwrap(), record);
    }
}
