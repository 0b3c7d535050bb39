use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use snip_crypto::IdentityCodec;
use tracing::debug;

use crate::error::Result;
use crate::state::AppState;

/// Name of the cookie that carries the sealed user id.
pub const USER_ID_COOKIE: &str = "shortener-user-id";

/// The anonymous caller behind a request.
///
/// Taken from the `shortener-user-id` cookie when it opens with the server
/// key; a fresh id is minted for a missing, malformed or foreign cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    /// The `Set-Cookie` header carrying this identity.
    pub fn cookie(&self, codec: &IdentityCodec) -> Result<[(HeaderName, HeaderValue); 1]> {
        let sealed = codec.seal(&self.user_id)?;
        let value = HeaderValue::from_str(&format!("{USER_ID_COOKIE}={sealed}; Path=/; HttpOnly"))?;
        Ok([(SET_COOKIE, value)])
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        if let Some(user_id) = cookie_value(&parts.headers, USER_ID_COOKIE)
            .and_then(|token| state.identity.open(token))
        {
            return Ok(Self { user_id });
        }

        let user_id = state.shortener.new_user_id();
        debug!(user_id = %user_id, "issuing new identity");
        Ok(Self { user_id })
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
