use crate::cryptographer::Cryptographer;
use crate::error::{CryptoError, Result};
use crate::key::EncryptionKey;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};

/// Size of the AES-GCM nonce prepended to every ciphertext.
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM cryptographer.
///
/// Output layout is `nonce || ciphertext || tag`. The nonce is drawn from the
/// OS RNG on every call, so no state has to survive a restart to avoid reuse.
#[derive(Clone)]
pub struct AesGcmCryptographer {
    cipher: Aes256Gcm,
}

impl AesGcmCryptographer {
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }
}

impl std::fmt::Debug for AesGcmCryptographer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmCryptographer").finish_non_exhaustive()
    }
}

impl Cryptographer for AesGcmCryptographer {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CryptoError::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN {
            return Err(CryptoError::CiphertextTooShort {
                min: NONCE_LEN,
                actual: ciphertext.len(),
            });
        }

        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cryptographer() -> AesGcmCryptographer {
        AesGcmCryptographer::new(&EncryptionKey::generate())
    }

    #[test]
    fn encrypts_and_decrypts_message() {
        let c = cryptographer();

        let encrypted = c.encrypt(b"some message").unwrap();
        assert!(!encrypted.is_empty());

        let decrypted = c.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted, b"some message");
    }

    #[test]
    fn round_trips_empty_and_binary_payloads() {
        let c = cryptographer();
        let binary: Vec<u8> = (0..=255).collect();

        for payload in [Vec::new(), binary, vec![0u8; 4096]] {
            let encrypted = c.encrypt(&payload).unwrap();
            assert_eq!(c.decrypt(&encrypted).unwrap(), payload);
        }
    }

    #[test]
    fn nonce_is_prepended_and_fresh() {
        let c = cryptographer();

        let first = c.encrypt(b"same").unwrap();
        let second = c.encrypt(b"same").unwrap();

        // nonce + plaintext + 16 byte tag
        assert_eq!(first.len(), NONCE_LEN + 4 + 16);
        assert_ne!(first[..NONCE_LEN], second[..NONCE_LEN]);
        assert_ne!(first, second);
    }

    #[test]
    fn too_short_ciphertext_is_rejected() {
        let c = cryptographer();

        let err = c.decrypt(&[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            CryptoError::CiphertextTooShort {
                min: NONCE_LEN,
                actual: 3
            }
        );
        assert!(c.decrypt(&[]).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let c = cryptographer();

        assert_eq!(c.decrypt(&[0u8; 64]).unwrap_err(), CryptoError::Decryption);
        // exactly one nonce, no tag
        assert_eq!(
            c.decrypt(&[0u8; NONCE_LEN]).unwrap_err(),
            CryptoError::Decryption
        );
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let c = cryptographer();

        let mut encrypted = c.encrypt(b"user-42").unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x01;

        assert_eq!(c.decrypt(&encrypted).unwrap_err(), CryptoError::Decryption);
    }

    #[test]
    fn other_key_cannot_decrypt() {
        let encrypted = cryptographer().encrypt(b"user-42").unwrap();

        assert_eq!(
            cryptographer().decrypt(&encrypted).unwrap_err(),
            CryptoError::Decryption
        );
    }
}
