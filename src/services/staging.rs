use crate::api::error::AppError;
use crate::config::ConverterConfig;
use crate::models::Upload;
use crate::services::cleanup::RequestFiles;
use crate::utils::validation::{FileCategory, sanitize_filename};
use axum::extract::multipart::MultipartError;
use std::path::PathBuf;
use tempfile::Builder;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{error, info};
use uuid::Uuid;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Receives uploaded file streams into the staging directory
pub struct UploadStaging {
    staging_dir: PathBuf,
    max_file_size: usize,
}

impl UploadStaging {
    pub fn new(staging_dir: impl Into<PathBuf>, max_file_size: usize) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            max_file_size,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.staging_dir.clone(), config.max_file_size)
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Stream one upload to disk and record it in `files`.
    ///
    /// The extension is checked before anything is written. Bytes go to a
    /// hidden temp file that only becomes `<uuid>_<sanitized name>` once the
    /// whole stream has been received within the size cap.
    pub async fn stage(
        &self,
        original_name: &str,
        category: FileCategory,
        mut reader: impl AsyncRead + Unpin + Send,
        files: &mut RequestFiles,
    ) -> Result<Upload, AppError> {
        if original_name.trim().is_empty() {
            return Err(AppError::Validation("No file selected".to_string()));
        }
        if !category.allows(original_name) {
            return Err(AppError::Validation(
                category.rejection_message().to_string(),
            ));
        }

        let temp = Builder::new()
            .prefix(".upload-")
            .tempfile_in(&self.staging_dir)
            .map_err(|e| AppError::Io(format!("Failed to create staging file: {}", e)))?;
        let mut writer = tokio::fs::File::from_std(
            temp.reopen()
                .map_err(|e| AppError::Io(format!("Failed to open staging file: {}", e)))?,
        );

        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        let mut total_size: usize = 0;

        loop {
            let n = reader
                .read(&mut buffer)
                .await
                .map_err(|e| self.read_error(e))?;
            if n == 0 {
                break;
            }
            total_size += n;
            if total_size > self.max_file_size {
                return Err(AppError::TooLarge {
                    limit: self.max_file_size,
                });
            }
            writer
                .write_all(&buffer[..n])
                .await
                .map_err(|e| AppError::Io(format!("Failed to write upload: {}", e)))?;
        }
        writer
            .flush()
            .await
            .map_err(|e| AppError::Io(format!("Failed to write upload: {}", e)))?;
        drop(writer);

        if total_size == 0 {
            return Err(AppError::Io("Uploaded file is empty".to_string()));
        }

        let path = self.staging_dir.join(format!(
            "{}_{}",
            Uuid::new_v4(),
            sanitize_filename(original_name)
        ));
        temp.persist(&path)
            .map_err(|e| AppError::Io(format!("Failed to save upload: {}", e.error)))?;
        files.track(&path);

        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|_| AppError::Io("File was not saved successfully".to_string()))?
            .len();
        if size == 0 {
            return Err(AppError::Io("Uploaded file is empty".to_string()));
        }

        info!("File saved: {} ({} bytes)", path.display(), size);

        Ok(Upload {
            original_name: original_name.to_string(),
            path,
            size,
        })
    }

    /// Map a failed read of the part stream back to the multipart cause
    fn read_error(&self, e: std::io::Error) -> AppError {
        if let Some(multipart) = e
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>())
        {
            return AppError::from_multipart(multipart, self.max_file_size);
        }
        error!("Upload stream error: {}", e);
        AppError::Io(format!("Failed to read upload: {}", e))
    }
}
