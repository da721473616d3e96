//! Model metadata handler

use axum::{extract::State, Json};
use serde::Serialize;

use pratiraksha_core::logic::model::{EngineStatus, ModelInfo};

use crate::AppState;

#[derive(Serialize)]
pub struct ModelResponse {
    #[serde(flatten)]
    info: ModelInfo,
    engine: EngineStatus,
}

pub async fn get(State(state): State<AppState>) -> Json<ModelResponse> {
    let engine = state
        .detector
        .as_ref()
        .map(|d| d.status())
        .unwrap_or_else(EngineStatus::unloaded);

    Json(ModelResponse {
        info: (*state.model_info).clone(),
        engine,
    })
}
