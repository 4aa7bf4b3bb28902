use crate::AppState;
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

pub const SUPPORTED_TOOLS: [&str; 4] = ["pdf-to-word", "word-to-pdf", "merge-pdf", "image-to-pdf"];

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy" when every converter is usable, "degraded" otherwise
    pub status: String,
    pub message: String,
    pub pdf_to_word_available: bool,
    pub office_available: bool,
    pub supported_tools: Vec<String>,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service status and converter availability", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let pdf_to_word_available = state.converters.pdf_to_word.health_check().await;
    let office_available = state.converters.office.health_check().await;

    let status = if pdf_to_word_available && office_available {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        message: "Document Converter API is running".to_string(),
        pdf_to_word_available,
        office_available,
        supported_tools: SUPPORTED_TOOLS.iter().map(|t| t.to_string()).collect(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}
