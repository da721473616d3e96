//! Threat log handlers

use axum::{extract::{Query, State}, Json};
use serde::Deserialize;

use pratiraksha_core::logic::threat_log::DEFAULT_RECENT_LIMIT;
use pratiraksha_core::ThreatDetection;

use crate::{AppError, AppResult, AppState};

pub const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ThreatQuery {
    pub limit: Option<usize>,
}

/// Most recent logged threats, newest first
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ThreatQuery>,
) -> AppResult<Json<Vec<ThreatDetection>>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(AppError::ValidationError(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let store = state.store.clone();
    let threats = tokio::task::spawn_blocking(move || store.recent(limit)).await??;
    Ok(Json(threats))
}
