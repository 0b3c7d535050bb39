use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use snip_shortener::ShortenerError;
use tracing::debug;

use crate::error::Result;
use crate::identity::Identity;
use crate::model::{BatchItemRequest, BatchItemResponse, ShortenRequest, ShortenResponse};
use crate::state::AppState;

/// Shortens the URL sent as the plain-text body and answers with the short URL.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    identity: Identity,
    body: String,
) -> Result<Response> {
    let (status, id) = shorten(&state, &body, &identity).await?;
    let cookie = identity.cookie(&state.identity)?;
    Ok((status, cookie, state.shortener.format_short_url(&id)).into_response())
}

pub async fn shorten_api_handler(
    State(state): State<AppState>,
    identity: Identity,
    payload: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload?;
    let (status, id) = shorten(&state, &request.url, &identity).await?;
    let cookie = identity.cookie(&state.identity)?;
    let response = ShortenResponse {
        result: state.shortener.format_short_url(&id),
    };
    Ok((status, cookie, Json(response)).into_response())
}

/// Stores the URL and reports which status to answer with. An URL that was
/// shortened before is a `409 Conflict` carrying the existing short id.
async fn shorten(state: &AppState, url: &str, identity: &Identity) -> Result<(StatusCode, String)> {
    match state.shortener.shorten(url, &identity.user_id).await {
        Ok(record) => Ok((StatusCode::CREATED, record.id)),
        Err(ShortenerError::Conflict(record)) => {
            debug!(id = %record.id, "url already shortened");
            Ok((StatusCode::CONFLICT, record.id))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    identity: Identity,
    payload: std::result::Result<Json<Vec<BatchItemRequest>>, JsonRejection>,
) -> Result<Response> {
    let Json(items) = payload?;
    let records = state
        .shortener
        .shorten_batch(items.into_iter().map(Into::into).collect(), &identity.user_id)
        .await?;

    let response: Vec<BatchItemResponse> = records
        .into_iter()
        .map(|record| BatchItemResponse {
            short_url: state.shortener.format_short_url(&record.id),
            correlation_id: record.correlation_id.unwrap_or_default(),
        })
        .collect();

    let cookie = identity.cookie(&state.identity)?;
    Ok((StatusCode::CREATED, cookie, Json(response)).into_response())
}

/// Redirects to the original URL.
pub async fn expand_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let record = state.shortener.expand(&id).await?;
    Ok(Redirect::temporary(&record.original_url))
}
