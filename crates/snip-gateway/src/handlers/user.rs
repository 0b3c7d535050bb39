use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::Result;
use crate::identity::Identity;
use crate::model::UserUrlResponse;
use crate::state::AppState;

pub async fn user_urls_handler(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Response> {
    let urls = state.shortener.urls_created_by(&identity.user_id).await?;
    let cookie = identity.cookie(&state.identity)?;

    if urls.is_empty() {
        return Ok((StatusCode::NO_CONTENT, cookie).into_response());
    }

    let response: Vec<UserUrlResponse> = urls
        .into_iter()
        .map(|url| UserUrlResponse {
            short_url: state.shortener.format_short_url(&url.id),
            original_url: url.original_url,
        })
        .collect();
    Ok((StatusCode::OK, cookie, Json(response)).into_response())
}

/// Accepts a JSON array of ids and deletes them in the background.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    identity: Identity,
    payload: std::result::Result<Json<Vec<String>>, JsonRejection>,
) -> Result<Response> {
    let Json(ids) = payload?;
    state.shortener.delete_urls(ids, &identity.user_id);

    let cookie = identity.cookie(&state.identity)?;
    Ok((StatusCode::ACCEPTED, cookie).into_response())
}
