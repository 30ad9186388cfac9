//! Link resolution API handler.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use stashlink_core::FetchError;

use crate::state::AppState;

/// A resolved link.
#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub id: String,
    pub url: String,
    /// Whether the link was served from the cache.
    pub cached: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct LinkErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// Resolve an item id to a durable link.
///
/// Serves from the cache when possible; otherwise drives (or joins) an
/// acquisition run and waits up to the configured bound. The id is passed
/// through verbatim: it is the cache key and the pipeline input, byte for
/// byte.
pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LinkResponse>, (StatusCode, Json<LinkErrorResponse>)> {
    match state.fetcher().fetch(&id).await {
        Ok(outcome) => Ok(Json(LinkResponse {
            id: outcome.id,
            url: outcome.url,
            cached: outcome.cached,
        })),
        Err(e) => Err(error_response(e)),
    }
}

fn error_response(error: FetchError) -> (StatusCode, Json<LinkErrorResponse>) {
    let status = match &error {
        FetchError::InvalidInput => StatusCode::BAD_REQUEST,
        FetchError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FetchError::Pipeline(_) => StatusCode::BAD_GATEWAY,
        FetchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let kind = match &error {
        FetchError::Pipeline(e) => e.kind(),
        other => other.metric_label(),
    };
    (
        status,
        Json(LinkErrorResponse {
            error: error.to_string(),
            kind,
        }),
    )
}
