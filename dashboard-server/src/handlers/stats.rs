//! Dashboard statistics handler

use axum::{extract::State, Json};

use pratiraksha_core::logic::threat_log::ThreatStats;

use crate::{AppResult, AppState};

/// Current counters, same payload as the `stats_update` event
pub async fn get(State(state): State<AppState>) -> AppResult<Json<ThreatStats>> {
    let store = state.store.clone();
    let stats = tokio::task::spawn_blocking(move || store.stats()).await??;
    Ok(Json(stats))
}
