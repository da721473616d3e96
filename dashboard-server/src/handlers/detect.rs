//! On-demand flow scoring

use axum::{extract::State, Json};

use pratiraksha_core::logic::analysis_loop::record_detection;
use pratiraksha_core::logic::model::score_flow;
use pratiraksha_core::{FlowRecord, ThreatDetection};

use crate::{AppError, AppResult, AppState};

fn validate(flow: &FlowRecord) -> Result<(), AppError> {
    let non_negative = [
        ("duration", flow.duration),
        ("src_bytes", flow.src_bytes),
        ("dst_bytes", flow.dst_bytes),
        ("active_time", flow.active_time),
        ("idle_time", flow.idle_time),
    ];

    for (field, value) in non_negative {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::ValidationError(format!(
                "{} must be a non-negative number",
                field
            )));
        }
    }
    Ok(())
}

/// Score a posted flow; it is counted, logged and broadcast like a
/// monitored one
pub async fn detect(
    State(state): State<AppState>,
    Json(flow): Json<FlowRecord>,
) -> AppResult<Json<ThreatDetection>> {
    validate(&flow)?;

    let detection = tokio::task::spawn_blocking(move || {
        let detection = score_flow(state.detector.as_deref(), &flow);
        record_detection(&state.store, &state.bus, &detection).map(|_| detection)
    })
    .await??;

    tracing::debug!(
        threat = %detection.threat_type,
        confidence = detection.confidence,
        method = %detection.method,
        "Scored submitted flow"
    );
    Ok(Json(detection))
}
