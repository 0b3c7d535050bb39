use clap::Parser;
use serde::Deserialize;
use snip_crypto::{CryptoError, EncryptionKey};
use snip_storage::StorageConfig;
use snip_telemetry::LogFormat;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SERVER_ADDRESS_ENV: &str = "SERVER_ADDRESS";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const ENCRYPTION_KEY_ENV: &str = "ENCRYPTION_KEY";
pub const CONFIG_ENV: &str = "CONFIG";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid encryption key: {0}")]
    EncryptionKey(#[from] CryptoError),
}

#[derive(Debug, Parser)]
#[command(name = "snip-gateway")]
pub struct Cli {
    /// Address the HTTP server listens on.
    #[arg(short = 'a', long, env = SERVER_ADDRESS_ENV)]
    pub server_address: Option<String>,

    /// Prefix of every short URL handed out.
    #[arg(short = 'b', long, env = BASE_URL_ENV)]
    pub base_url: Option<String>,

    /// Append-only file used as storage when no database is configured.
    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    /// PostgreSQL connection string.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// Hex encoded 32-byte key sealing the identity cookie.
    #[arg(long, env = ENCRYPTION_KEY_ENV, hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// JSON file filling the settings not given on the command line.
    #[arg(short = 'c', long, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    #[arg(long, env = LOG_FORMAT_ENV, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Settings read from the `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub server_address: Option<String>,
    pub file_storage_path: Option<PathBuf>,
    pub database_dsn: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved gateway settings.
#[derive(Debug)]
pub struct Settings {
    pub server_address: String,
    pub base_url: String,
    pub storage: StorageConfig,
    pub encryption_key: EncryptionKey,
    /// Whether the key was generated because none was configured.
    pub ephemeral_key: bool,
    pub log_format: LogFormat,
}

impl Cli {
    /// Merges the command line with the config file and applies defaults.
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let file = match non_empty_path(self.config) {
            Some(path) => FileConfig::load(&path)?,
            None => FileConfig::default(),
        };

        let (encryption_key, ephemeral_key) = match non_empty(self.encryption_key) {
            Some(hex) => (EncryptionKey::from_hex(&hex)?, false),
            None => (EncryptionKey::generate(), true),
        };

        Ok(Settings {
            server_address: non_empty(self.server_address)
                .or_else(|| non_empty(file.server_address))
                .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string()),
            base_url: non_empty(self.base_url)
                .or_else(|| non_empty(file.base_url))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            storage: StorageConfig {
                database_dsn: non_empty(self.database_dsn).or_else(|| non_empty(file.database_dsn)),
                file_storage_path: non_empty_path(self.file_storage_path)
                    .or_else(|| non_empty_path(file.file_storage_path)),
            },
            encryption_key,
            ephemeral_key,
            log_format: self.log_format,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|path| !path.as_os_str().is_empty())
}
