use crate::services::converters::ConversionError;
use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing, malformed or disallowed input
    #[error("{0}")]
    Validation(String),

    /// An adapter or the external tool failed
    #[error("{context}: {source}")]
    Conversion {
        context: &'static str,
        #[source]
        source: ConversionError,
    },

    /// Staging or filesystem failure
    #[error("{0}")]
    Io(String),

    /// Upload over the per-file cap, given in bytes
    #[error("File too large. Maximum size is {}.", format_size(.limit))]
    TooLarge { limit: usize },
}

/// Size in the largest unit that divides it exactly
fn format_size(bytes: &usize) -> String {
    let bytes = *bytes;
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;
    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        format!("{} bytes", bytes)
    }
}

impl AppError {
    pub fn conversion(context: &'static str, source: ConversionError) -> Self {
        AppError::Conversion { context, source }
    }

    /// Classify a multipart parsing failure; body-limit hits become `TooLarge`
    pub fn from_multipart(e: &MultipartError, limit: usize) -> Self {
        let text = e.body_text();
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE || text.contains("length limit exceeded") {
            AppError::TooLarge { limit }
        } else {
            AppError::Validation(text)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conversion { .. } | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(format!("File system error: {}", e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Validation(msg) => tracing::warn!("Rejected request: {}", msg),
            AppError::TooLarge { .. } => tracing::warn!("File too large error"),
            AppError::Conversion { source, .. } => {
                tracing::error!("❌ {} ({:?})", self, source)
            }
            AppError::Io(msg) => tracing::error!("❌ I/O error: {}", msg),
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
