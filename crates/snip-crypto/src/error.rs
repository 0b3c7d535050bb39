use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptoError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("invalid key encoding: {0}")]
    InvalidKey(String),
    #[error("ciphertext too short: expected at least {min} bytes, got {actual}")]
    CiphertextTooShort { min: usize, actual: usize },
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed")]
    Decryption,
}
