use crate::cryptographer::Cryptographer;
use crate::error::Result;
use std::sync::Arc;
use tracing::debug;

/// Turns user ids into tamper-proof cookie values and back.
///
/// The cookie value is the hex encoding of whatever the cryptographer
/// produces. Any failure to recover an id is reported as `None`; callers are
/// expected to mint a fresh identity instead of rejecting the request.
#[derive(Clone)]
pub struct IdentityCodec {
    cryptographer: Arc<dyn Cryptographer>,
}

impl IdentityCodec {
    pub fn new(cryptographer: impl Cryptographer) -> Self {
        Self {
            cryptographer: Arc::new(cryptographer),
        }
    }

    /// Encrypts `user_id` and hex-encodes the result.
    pub fn seal(&self, user_id: &str) -> Result<String> {
        let encrypted = self.cryptographer.encrypt(user_id.as_bytes())?;
        Ok(hex::encode(encrypted))
    }

    /// Recovers the user id from a cookie value.
    pub fn open(&self, token: &str) -> Option<String> {
        let encrypted = match hex::decode(token) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "identity token is not valid hex");
                return None;
            }
        };

        let decrypted = match self.cryptographer.decrypt(&encrypted) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "identity token failed to decrypt");
                return None;
            }
        };

        String::from_utf8(decrypted).ok()
    }
}

impl std::fmt::Debug for IdentityCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCodec").finish_non_exhaustive()
    }
}
