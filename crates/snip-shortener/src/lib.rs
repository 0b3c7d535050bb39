//! URL shortener service implementation.
//!
//! This crate provides the [`Shortener`] facade over a repository and an id
//! generator, and the concurrent [`DeletionPipeline`] it uses to soft-delete
//! urls in the background.

pub mod deletion;
pub mod error;
pub mod service;
pub mod shortener;

pub use deletion::{CandidateBuilder, CandidateError, DeletionPipeline, OwnerScoped};
pub use error::{Result, ShortenerError};
pub use service::ShortenerService;
pub use shortener::{BatchRequest, Shortener};
