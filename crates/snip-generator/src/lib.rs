pub mod error;
pub mod hash;
pub mod user;

pub use error::{GeneratorError, Result};
pub use hash::HashGenerator;
pub use user::{UserIdGenerator, UuidGenerator};

/// Trait for deriving short ids from original URLs.
///
/// Implementations are pure functions of their input and don't interact
/// with storage: the same URL always maps to the same id, which is what lets
/// the repository report a repeated URL as a uniqueness conflict.
pub trait Generator: Send + Sync + 'static {
    /// Derives the short id for `input`.
    fn generate_id(&self, input: &str) -> Result<String>;
}
