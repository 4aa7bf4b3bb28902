pub mod convert;
pub mod health;

use crate::api::error::AppError;
use crate::models::Upload;
use crate::services::cleanup::RequestFiles;
use crate::services::staging::UploadStaging;
use crate::utils::validation::FileCategory;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartRejection;
use futures::TryStreamExt;
use serde::Serialize;
use std::collections::HashMap;
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Per-route input rules
pub struct RouteSpec {
    pub category: FileCategory,
    /// Most file parts the route stages
    pub max_files: usize,
    /// Error when more than `max_files` file parts arrive
    pub too_many: &'static str,
    /// Name each rejected file by position, even a lone `file` part
    pub numbered_errors: bool,
    /// Prefix of conversion failures
    pub error_context: &'static str,
}

impl RouteSpec {
    fn rejection(&self, position: usize, err: AppError) -> AppError {
        let message = match err {
            AppError::Validation(message) => message,
            other => return other,
        };
        if message == "No file selected" {
            return AppError::Validation(format!("File {} is empty", position));
        }
        let what = match self.category {
            FileCategory::Pdf => "a PDF",
            FileCategory::Word => "a Word document (.doc, .docx)",
            FileCategory::Image => "an image (JPG, JPEG, PNG)",
        };
        AppError::Validation(format!("File {} must be {}", position, what))
    }
}

/// Staged file parts and text parts of one request
#[derive(Debug, Default)]
pub struct ConversionForm {
    uploads: HashMap<String, Upload>,
    fields: HashMap<String, String>,
}

impl ConversionForm {
    pub fn take_upload(&mut self, name: &str) -> Option<Upload> {
        self.uploads.remove(name)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }

    /// `file_count`, treating an absent field as zero
    pub fn file_count(&self) -> Result<usize, AppError> {
        match self.field("file_count").map(str::trim) {
            None | Some("") => Ok(0),
            Some(value) => value
                .parse()
                .map_err(|_| AppError::Validation("Invalid file_count".to_string())),
        }
    }
}

/// Zero-based index of a `file_<n>` part name
fn indexed_position(name: &str) -> Option<usize> {
    name.strip_prefix("file_")?.parse().ok()
}

/// Read the whole multipart body, staging `file` / `file_<n>` parts as they
/// arrive and keeping every other part as text.
pub async fn collect_form(
    staging: &UploadStaging,
    multipart: Result<Multipart, MultipartRejection>,
    spec: &RouteSpec,
    files: &mut RequestFiles,
) -> Result<ConversionForm, AppError> {
    let mut multipart = multipart.map_err(|rejection| {
        AppError::Validation(format!("Invalid upload request: {}", rejection.body_text()))
    })?;
    let mut form = ConversionForm::default();
    let limit = staging.max_file_size();
    let mut staged = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::from_multipart(&e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();

        let Some(original_name) = field.file_name().map(|s| s.to_string()) else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::from_multipart(&e, limit))?;
            form.fields.insert(name, text);
            continue;
        };

        let position = if name == "file" {
            if spec.numbered_errors { Some(1) } else { None }
        } else if let Some(index) = indexed_position(&name) {
            Some(index + 1)
        } else {
            tracing::debug!("Ignoring unexpected file part '{}'", name);
            continue;
        };

        if staged >= spec.max_files {
            return Err(AppError::Validation(spec.too_many.to_string()));
        }

        tracing::info!("Receiving '{}' as part '{}'", original_name, name);
        let reader = StreamReader::new(field.map_err(std::io::Error::other));
        let upload = staging
            .stage(&original_name, spec.category, reader, files)
            .await
            .map_err(|e| match position {
                Some(position) => spec.rejection(position, e),
                None => e,
            })?;
        staged += 1;

        // A repeated part name keeps the first; the later copy stays in the
        // ledger and is cleaned up with the rest of the request
        form.uploads.entry(name).or_insert(upload);
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MERGE: RouteSpec = RouteSpec {
        category: FileCategory::Pdf,
        max_files: 10,
        too_many: "Maximum 10 PDF files allowed for merging",
        numbered_errors: false,
        error_context: "Merge error",
    };

    #[test]
    fn test_indexed_position() {
        assert_eq!(indexed_position("file_0"), Some(0));
        assert_eq!(indexed_position("file_12"), Some(12));
        assert_eq!(indexed_position("file_x"), None);
        assert_eq!(indexed_position("file"), None);
    }

    #[test]
    fn test_numbered_rejections() {
        let err = MERGE.rejection(3, AppError::Validation("Only PDF files are allowed".into()));
        assert_eq!(err.to_string(), "File 3 must be a PDF");

        let err = MERGE.rejection(2, AppError::Validation("No file selected".into()));
        assert_eq!(err.to_string(), "File 2 is empty");

        let err = MERGE.rejection(1, AppError::TooLarge { limit: 1024 });
        assert!(matches!(err, AppError::TooLarge { limit: 1024 }));
    }

    #[test]
    fn test_file_count_parsing() {
        let mut form = ConversionForm::default();
        assert_eq!(form.file_count().unwrap(), 0);

        form.fields.insert("file_count".into(), " 4 ".into());
        assert_eq!(form.file_count().unwrap(), 4);

        form.fields.insert("file_count".into(), "four".into());
        assert_eq!(form.file_count().unwrap_err().to_string(), "Invalid file_count");
    }
}
