pub mod images;
pub mod merge;
pub mod office;
pub mod pdf_to_word;

use crate::config::ConverterConfig;
use crate::models::ConversionJob;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub use images::ImageToPdfConverter;
pub use merge::PdfMerger;
pub use office::{OfficeConverter, ProcessOutcome};
pub use pdf_to_word::PdfToWordConverter;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Library(String),

    #[error("failed to launch {binary}: {source}")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("office process failed with {status}: {stderr}")]
    ProcessFailed { status: String, stderr: String },

    #[error("office conversion timed out after {secs}s - file may be too large or complex")]
    Timeout { secs: u64 },

    #[error("converter did not create output file. Expected: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("output file is suspiciously small ({size} bytes, expected at least {min})")]
    OutputTooSmall { size: u64, min: u64 },

    #[error("{0}")]
    MalformedOutput(String),

    #[error("{0}")]
    NoUsableInput(String),

    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
}

/// A wrapper around one external conversion capability
#[async_trait::async_trait]
pub trait ConverterAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Convert `job.inputs` into `job.output`, returning the produced path
    async fn convert(&self, job: &ConversionJob) -> Result<PathBuf, ConversionError>;

    /// Whether the underlying capability is usable
    async fn health_check(&self) -> bool {
        true
    }
}

/// The adapter behind each conversion route
#[derive(Clone)]
pub struct Converters {
    pub pdf_to_word: Arc<dyn ConverterAdapter>,
    pub office: Arc<dyn ConverterAdapter>,
    pub merge: Arc<dyn ConverterAdapter>,
    pub images: Arc<dyn ConverterAdapter>,
}

impl Converters {
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self {
            pdf_to_word: Arc::new(PdfToWordConverter),
            office: Arc::new(OfficeConverter::from_config(config)),
            merge: Arc::new(PdfMerger),
            images: Arc::new(ImageToPdfConverter),
        }
    }
}

/// The job's only input, or an error for multi-input jobs
pub(crate) fn single_input(job: &ConversionJob) -> Result<&Path, ConversionError> {
    match job.inputs.as_slice() {
        [input] => Ok(input.as_path()),
        inputs => Err(ConversionError::InvalidInput(format!(
            "expected exactly one input file, got {}",
            inputs.len()
        ))),
    }
}

/// Existence and minimum-size check shared by every adapter
pub(crate) fn ensure_output_size(path: &Path, min: u64) -> Result<u64, ConversionError> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConversionError::MissingOutput(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!("Output file size: {} bytes", size);
    if size < min {
        return Err(ConversionError::OutputTooSmall { size, min });
    }
    Ok(size)
}

/// Run CPU-bound library work off the async workers
pub(crate) async fn run_blocking<T, F>(task: F) -> Result<T, ConversionError>
where
    F: FnOnce() -> Result<T, ConversionError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ConversionError::Library(format!("conversion task failed: {}", e)))?
}
