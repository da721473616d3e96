//! Health check handler

use axum::Json;
use serde::Serialize;

use pratiraksha_core::constants::SERVICE_NAME;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
    })
}
