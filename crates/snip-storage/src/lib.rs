pub mod config;
pub mod file;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use snip_core::{Repository, Result};
use tracing::info;

pub use config::{Backend, StorageConfig};
pub use file::FileRepository;
pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;
pub use snip_core::{ReadRepository, StorageError};

/// Opens the backend selected by `config`.
///
/// The PostgreSQL backend creates its table on first use.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn Repository>> {
    match config.backend() {
        Backend::Postgres(dsn) => {
            info!("using postgres storage");
            let repo = PostgresRepository::connect(dsn).await?;
            repo.ensure_schema().await?;
            Ok(Arc::new(repo))
        }
        Backend::File(path) => {
            info!(path = %path.display(), "using file storage");
            Ok(Arc::new(FileRepository::open(path).await?))
        }
        Backend::Memory => {
            info!("using in-memory storage");
            Ok(Arc::new(InMemoryRepository::new()))
        }
    }
}
