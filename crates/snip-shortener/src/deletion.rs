//! Concurrent soft deletion of a caller's urls.
//!
//! A feeder pushes raw ids into one bounded channel shared by a fixed set of
//! workers. Each worker turns an id into a [`DeletionCandidate`] and forwards
//! it to a single output channel, which is drained into one batch handed to
//! [`Repository::delete_urls`].

use snip_core::{DeletionCandidate, Repository, StorageError};
use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, warn};

/// How many times an id is offered to the builder before it is dropped.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateError {
    #[error("invalid id: {0:?}")]
    InvalidId(String),
    #[error("candidate builder panicked: {0}")]
    Panicked(String),
}

/// Turns a raw id submitted by `owner` into a deletion candidate.
pub trait CandidateBuilder: Send + Sync + 'static {
    fn build(&self, id: &str, owner: &str) -> Result<DeletionCandidate, CandidateError>;
}

/// Pairs every non-blank id with the submitting owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerScoped;

impl CandidateBuilder for OwnerScoped {
    fn build(&self, id: &str, owner: &str) -> Result<DeletionCandidate, CandidateError> {
        if id.trim().is_empty() {
            return Err(CandidateError::InvalidId(id.to_string()));
        }
        Ok(DeletionCandidate::new(id, owner))
    }
}

pub struct DeletionPipeline<R: ?Sized> {
    repository: Arc<R>,
    builder: Arc<dyn CandidateBuilder>,
    workers: usize,
    max_attempts: usize,
}

impl<R: ?Sized> Clone for DeletionPipeline<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            builder: Arc::clone(&self.builder),
            workers: self.workers,
            max_attempts: self.max_attempts,
        }
    }
}

impl<R: Repository + ?Sized> DeletionPipeline<R> {
    /// Creates a pipeline with one worker per available CPU.
    pub fn new(repository: Arc<R>) -> Self {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);

        Self {
            repository,
            builder: Arc::new(OwnerScoped),
            workers,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_builder(mut self, builder: impl CandidateBuilder) -> Self {
        self.builder = Arc::new(builder);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Builds candidates for `ids` concurrently and soft-deletes them in one
    /// repository call. Returns the number of candidates submitted.
    ///
    /// Ids the builder keeps rejecting are logged and left out of the batch.
    pub async fn run(&self, ids: Vec<String>, owner: &str) -> Result<usize, StorageError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let workers = self.workers.min(ids.len()).max(1);
        let (id_tx, id_rx) = mpsc::channel::<String>(workers);
        let (candidate_tx, mut candidate_rx) = mpsc::channel::<DeletionCandidate>(workers);
        let id_rx = Arc::new(Mutex::new(id_rx));
        let owner: Arc<str> = Arc::from(owner);

        let mut tasks = JoinSet::new();
        for _ in 0..workers {
            let id_rx = Arc::clone(&id_rx);
            let candidate_tx = candidate_tx.clone();
            let builder = Arc::clone(&self.builder);
            let owner = Arc::clone(&owner);
            let max_attempts = self.max_attempts;

            tasks.spawn(async move {
                loop {
                    let next = id_rx.lock().await.recv().await;
                    let Some(id) = next else { break };

                    match build_with_retry(builder.as_ref(), &id, &owner, max_attempts) {
                        Ok(candidate) => {
                            if candidate_tx.send(candidate).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(id = %id, attempts = max_attempts, error = %err, "dropping url from deletion batch");
                        }
                    }
                }
            });
        }
        drop(candidate_tx);

        tasks.spawn(async move {
            for id in ids {
                if id_tx.send(id).await.is_err() {
                    break;
                }
            }
        });

        let mut candidates = Vec::new();
        while let Some(candidate) = candidate_rx.recv().await {
            candidates.push(candidate);
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "deletion worker failed");
            }
        }

        let submitted = candidates.len();
        if submitted > 0 {
            self.repository.delete_urls(&candidates).await?;
        }
        debug!(owner = %owner, submitted, "deletion batch submitted");

        Ok(submitted)
    }

    /// Runs the pipeline in the background. A failed repository call is
    /// logged, never returned.
    pub fn spawn(&self, ids: Vec<String>, owner: String) -> JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            if let Err(err) = pipeline.run(ids, &owner).await {
                error!(owner = %owner, error = %err, "couldn't delete urls");
            }
        })
    }
}

fn build_with_retry(
    builder: &dyn CandidateBuilder,
    id: &str,
    owner: &str,
    max_attempts: usize,
) -> Result<DeletionCandidate, CandidateError> {
    let mut attempt = 1;
    loop {
        let result = catch_unwind(AssertUnwindSafe(|| builder.build(id, owner)))
            .unwrap_or_else(|payload| Err(CandidateError::Panicked(panic_message(payload))));

        match result {
            Ok(candidate) => return Ok(candidate),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(err) => {
                debug!(id, attempt, error = %err, "retrying deletion candidate");
                attempt += 1;
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
