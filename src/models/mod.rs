use crate::utils::validation::original_stem;
use std::path::{Path, PathBuf};

/// A received file persisted in the staging directory
#[derive(Debug, Clone)]
pub struct Upload {
    /// Filename as declared by the client
    pub original_name: String,
    /// Unique on-disk location (`<uuid>_<sanitized name>`)
    pub path: PathBuf,
    pub size: u64,
}

impl Upload {
    /// Stem of the client filename, used to name the download
    pub fn original_stem(&self) -> &str {
        original_stem(&self.original_name)
    }

    /// Stem of the staged file; unique, so derived outputs are unique too
    pub fn staged_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    /// Unique output filename for converting this upload to `target`
    pub fn output_name(&self, target: TargetFormat) -> String {
        format!("{}.{}", self.staged_stem(), target.extension())
    }

    /// Filename the caller sees for the converted upload
    pub fn download_name(&self, target: TargetFormat) -> String {
        format!("{}.{}", self.original_stem(), target.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Docx,
    Pdf,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Docx => "docx",
            TargetFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> String {
        match self {
            TargetFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                    .to_string()
            }
            TargetFormat::Pdf => mime::APPLICATION_PDF.to_string(),
        }
    }
}

/// One unit of conversion work; lives only for the duration of a request
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Inputs in declared order
    pub inputs: Vec<PathBuf>,
    pub target: TargetFormat,
    pub output: PathBuf,
}

impl ConversionJob {
    pub fn new(inputs: Vec<PathBuf>, target: TargetFormat, output: PathBuf) -> Self {
        Self {
            inputs,
            target,
            output,
        }
    }

    pub fn single(input: &Path, target: TargetFormat, output: PathBuf) -> Self {
        Self::new(vec![input.to_path_buf()], target, output)
    }
}

/// The produced file and how it should be presented to the caller
#[derive(Debug, Clone)]
pub struct ConvertedArtifact {
    pub path: PathBuf,
    pub download_name: String,
    pub content_type: String,
    pub size: u64,
}
