use crate::error::Result;

/// Encrypts and decrypts opaque byte strings with a server-held key.
///
/// Implementations must be authenticated: `decrypt` of anything that was not
/// produced by `encrypt` under the same key has to fail.
pub trait Cryptographer: Send + Sync + 'static {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}
