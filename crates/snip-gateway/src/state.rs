use std::sync::Arc;

use snip_crypto::IdentityCodec;
use snip_shortener::Shortener;

#[derive(Clone)]
pub struct AppState {
    pub shortener: Arc<dyn Shortener>,
    pub identity: IdentityCodec,
}

impl AppState {
    pub fn new(shortener: Arc<dyn Shortener>, identity: IdentityCodec) -> Self {
        Self {
            shortener,
            identity,
        }
    }
}
