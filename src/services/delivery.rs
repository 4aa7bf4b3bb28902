use crate::api::error::AppError;
use crate::models::ConvertedArtifact;
use crate::services::cleanup::RequestFiles;
use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

/// `Content-Disposition` value with an ASCII fallback and an RFC 5987 UTF-8 name
pub fn content_disposition(filename: &str) -> String {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(64)
        .collect::<String>();
    let fallback_filename = if ascii_filename.trim().is_empty() {
        "download"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    )
}

/// Stream `artifact` as an attachment.
///
/// The request's files are deleted `grace` after the body completes or is
/// dropped. If the artifact cannot be opened they are deleted immediately.
pub async fn attachment(
    artifact: ConvertedArtifact,
    files: RequestFiles,
    grace: Duration,
) -> Result<Response, AppError> {
    let file = match tokio::fs::File::open(&artifact.path).await {
        Ok(file) => file,
        Err(e) => {
            error!("Cannot open converted file {}: {}", artifact.path.display(), e);
            files.purge().await;
            return Err(AppError::Io(format!("Failed to read converted file: {}", e)));
        }
    };

    info!(
        "📤 Sending {} ({} bytes) as {}",
        artifact.path.display(),
        artifact.size,
        artifact.download_name
    );

    let cleanup = files.defer(grace);
    let stream = ReaderStream::new(file).map(move |chunk| {
        // The guard lives exactly as long as the body stream
        let _guard = &cleanup;
        chunk
    });

    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type),
            (header::CONTENT_LENGTH, artifact.size.to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&artifact.download_name),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}
