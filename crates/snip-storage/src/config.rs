use std::path::PathBuf;

/// Selects and parameterizes the storage backend.
///
/// A database DSN wins over a file path; with neither set the repository
/// lives in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    pub database_dsn: Option<String>,
    pub file_storage_path: Option<PathBuf>,
}

/// The backend [`StorageConfig`] resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend<'a> {
    Postgres(&'a str),
    File(&'a PathBuf),
    Memory,
}

impl StorageConfig {
    pub fn backend(&self) -> Backend<'_> {
        let dsn = self.database_dsn.as_deref().filter(|dsn| !dsn.is_empty());
        let path = self
            .file_storage_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty());

        match (dsn, path) {
            (Some(dsn), _) => Backend::Postgres(dsn),
            (None, Some(path)) => Backend::File(path),
            (None, None) => Backend::Memory,
        }
    }
}
