use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub provider: &'static str,
    pub active_sessions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,
    pub resumable: bool,
}

/// Health check handler
///
/// Reports the number of live relay sessions and whether a resumption handle
/// is available for the next session.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "OK",
        provider: state.connector.provider_name(),
        active_sessions: state.registry.len(),
        max_sessions: state.registry.max_sessions(),
        resumable: state.session_store.current().is_some(),
    })
}
