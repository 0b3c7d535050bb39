use axum::extract::rejection::JsonRejection;
use axum::http::header::InvalidHeaderValue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use snip_crypto::CryptoError;
use snip_shortener::ShortenerError;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
    #[error("cannot decode json: {0}")]
    Json(#[from] JsonRejection),
    #[error("cannot issue identity: {0}")]
    Identity(#[from] CryptoError),
    #[error("invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Shortener(err) => match err {
                ShortenerError::Conflict(_) => StatusCode::CONFLICT,
                ShortenerError::NotFound(_) => StatusCode::NOT_FOUND,
                ShortenerError::Gone(_) => StatusCode::GONE,
                ShortenerError::InvalidUrl(_) | ShortenerError::Generator(_) => {
                    StatusCode::BAD_REQUEST
                }
                ShortenerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::Identity(_) | Self::Header(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_core::{ShortUrl, StorageError};

    #[test]
    fn shortener_errors_map_to_statuses() {
        let cases = [
            (
                ShortenerError::Conflict(Box::new(ShortUrl::new("https://a.com", "a", "u1"))),
                StatusCode::CONFLICT,
            ),
            (ShortenerError::NotFound("a".into()), StatusCode::NOT_FOUND),
            (ShortenerError::Gone("a".into()), StatusCode::GONE),
            (ShortenerError::InvalidUrl("".into()), StatusCode::BAD_REQUEST),
            (
                ShortenerError::Storage(StorageError::Unavailable("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }
}
