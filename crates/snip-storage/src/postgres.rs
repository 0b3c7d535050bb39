use async_trait::async_trait;
use jiff::Timestamp;
use snip_core::{
    DeletionCandidate, ReadRepository, Repository, Result, ShortUrl, Stats, StorageError,
};
use sqlx::postgres::{PgDatabaseError, PgPool, PgRow};
use sqlx::Row;
use std::collections::BTreeMap;
use tracing::debug;

/// Table definition expected by [`PostgresRepository`].
pub const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

/// PostgreSQL implementation of the repository contract.
///
/// Soft delete is implemented with `deleted_at` (unix microseconds). Every
/// read returns deleted rows too; the unique constraint on `id` covers them,
/// so a soft-deleted id is never reused.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository from an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `urls` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_deleted_at(micros: Option<i64>) -> Result<Option<Timestamp>> {
    micros
        .map(|value| {
            Timestamp::from_microsecond(value).map_err(|e| {
                StorageError::InvalidData(format!("invalid deleted_at timestamp '{}': {e}", value))
            })
        })
        .transpose()
}

fn row_to_url(row: &PgRow) -> Result<ShortUrl> {
    let deleted_at: Option<i64> = row.try_get("deleted_at").map_err(map_sqlx_error)?;
    Ok(ShortUrl {
        original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
        id: row.try_get("id").map_err(map_sqlx_error)?,
        created_by: row.try_get("created_by").map_err(map_sqlx_error)?,
        correlation_id: row.try_get("correlation_id").map_err(map_sqlx_error)?,
        deleted_at: parse_deleted_at(deleted_at)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

/// Extracts the offending id from a unique violation, whose detail reads
/// `Key (id)=(abc123) already exists.`
fn conflicting_id(err: &sqlx::Error) -> Option<String> {
    let detail = err
        .as_database_error()?
        .try_downcast_ref::<PgDatabaseError>()?
        .detail()?;
    parse_key_detail(detail)
}

fn parse_key_detail(detail: &str) -> Option<String> {
    detail
        .strip_prefix("Key (id)=(")?
        .strip_suffix(") already exists.")
        .map(str::to_string)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadRepository for PostgresRepository {
    async fn get_by_id(&self, id: &str) -> Result<ShortUrl> {
        let row = sqlx::query(
            r#"
            SELECT original_url, id, created_by, correlation_id, deleted_at
            FROM urls
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => row_to_url(&row),
            None => Err(StorageError::NotFound(id.to_string())),
        }
    }

    async fn get_users_urls(&self, user_id: &str) -> Result<Vec<ShortUrl>> {
        let rows = sqlx::query(
            r#"
            SELECT original_url, id, created_by, correlation_id, deleted_at
            FROM urls
            WHERE created_by = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_url).collect()
    }

    async fn get_users_and_urls_count(&self) -> Result<Stats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS urls, COUNT(DISTINCT created_by) AS users
            FROM urls
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let urls: i64 = row.try_get("urls").map_err(map_sqlx_error)?;
        let users: i64 = row.try_get("users").map_err(map_sqlx_error)?;
        Ok(Stats {
            urls: urls as usize,
            users: users as usize,
        })
    }

    async fn check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn save(&self, url: ShortUrl) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO urls (original_url, id, created_by, correlation_id, deleted_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&url.original_url)
        .bind(&url.id)
        .bind(&url.created_by)
        .bind(&url.correlation_id)
        .bind(url.deleted_at.map(|ts| ts.as_microsecond()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StorageError::not_unique(url)),
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn save_batch(&self, batch: Vec<ShortUrl>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut original_urls = Vec::with_capacity(batch.len());
        let mut ids = Vec::with_capacity(batch.len());
        let mut created_by = Vec::with_capacity(batch.len());
        let mut correlation_ids = Vec::with_capacity(batch.len());
        let mut deleted_at = Vec::with_capacity(batch.len());
        for url in &batch {
            original_urls.push(url.original_url.clone());
            ids.push(url.id.clone());
            created_by.push(url.created_by.clone());
            correlation_ids.push(url.correlation_id.clone());
            deleted_at.push(url.deleted_at.map(|ts| ts.as_microsecond()));
        }

        // One statement, so the unique constraint rejects the batch atomically.
        let result = sqlx::query(
            r#"
            INSERT INTO urls (original_url, id, created_by, correlation_id, deleted_at)
            SELECT * FROM UNNEST($1::text[], $2::varchar[], $3::varchar[], $4::varchar[], $5::bigint[])
            "#,
        )
        .bind(original_urls)
        .bind(ids)
        .bind(created_by)
        .bind(correlation_ids)
        .bind(deleted_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                let offending = conflicting_id(&err)
                    .and_then(|id| batch.iter().position(|url| url.id == id))
                    .unwrap_or(0);
                Err(StorageError::not_unique(batch[offending].clone()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn delete_urls(&self, urls: &[DeletionCandidate]) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        let mut by_owner: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for candidate in urls {
            by_owner
                .entry(candidate.created_by.as_str())
                .or_default()
                .push(candidate.id.clone());
        }

        let now = Timestamp::now().as_microsecond();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for (owner, ids) in by_owner {
            let result = sqlx::query(
                r#"
                UPDATE urls
                SET deleted_at = $1
                WHERE created_by = $2
                  AND id = ANY($3)
                  AND deleted_at IS NULL
                "#,
            )
            .bind(now)
            .bind(owner)
            .bind(ids)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            debug!(owner, deleted = result.rows_affected(), "soft-deleted urls");
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
