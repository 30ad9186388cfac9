use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use stashlink_core::{FetcherStatus, SanitizedConfig};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// In-flight acquisitions, for dashboards and debugging.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<FetcherStatus> {
    Json(state.fetcher().status())
}

pub async fn get_metrics() -> String {
    crate::metrics::encode_metrics()
}
