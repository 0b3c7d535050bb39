//! Symmetric protection of the anonymous caller identity.
//!
//! [`AesGcmCryptographer`] seals byte strings with AES-256-GCM and a fresh
//! random nonce per call. [`IdentityCodec`] builds the hex cookie value on
//! top of any [`Cryptographer`].

pub mod cryptographer;
pub mod error;
pub mod gcm;
pub mod identity;
pub mod key;

pub use cryptographer::Cryptographer;
pub use error::{CryptoError, Result};
pub use gcm::AesGcmCryptographer;
pub use identity::IdentityCodec;
pub use key::EncryptionKey;
