use super::{ConversionForm, ErrorResponse, RouteSpec, collect_form};
use crate::AppState;
use crate::api::error::AppError;
use crate::config::{MAX_IMAGE_FILES, MAX_MERGE_FILES, MIN_MERGE_FILES};
use crate::models::{ConversionJob, ConvertedArtifact, TargetFormat, Upload};
use crate::services::cleanup::RequestFiles;
use crate::services::converters::{ConversionError, ConverterAdapter};
use crate::services::delivery;
use crate::utils::validation::FileCategory;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::Response;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

const PDF_TO_WORD: RouteSpec = RouteSpec {
    category: FileCategory::Pdf,
    max_files: 1,
    too_many: "Only one PDF can be converted per request",
    numbered_errors: false,
    error_context: "Conversion error",
};

const WORD_TO_PDF: RouteSpec = RouteSpec {
    category: FileCategory::Word,
    max_files: 1,
    too_many: "Only one document can be converted per request",
    numbered_errors: false,
    error_context: "Conversion error",
};

const MERGE_PDF: RouteSpec = RouteSpec {
    category: FileCategory::Pdf,
    max_files: MAX_MERGE_FILES,
    too_many: "Maximum 10 PDF files allowed for merging",
    numbered_errors: false,
    error_context: "Merge error",
};

const IMAGE_TO_PDF: RouteSpec = RouteSpec {
    category: FileCategory::Image,
    max_files: MAX_IMAGE_FILES,
    too_many: "Maximum 20 images allowed",
    numbered_errors: true,
    error_context: "Image conversion error",
};

/// Multipart body of the single-file routes
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct SingleFileForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// Multipart body of the batch routes: `file_count` then `file_0` … `file_<n-1>`
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct BatchFileForm {
    file_count: u32,
    #[schema(value_type = String, format = Binary)]
    file_0: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    file_1: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/convert/pdf-to-word",
    request_body(content = SingleFileForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Converted .docx attachment"),
        (status = 400, description = "Missing or invalid upload", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Conversion failed", body = ErrorResponse)
    ),
    tag = "convert"
)]
pub async fn pdf_to_word(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    info!("=== PDF to Word Conversion Request ===");
    let mut files = RequestFiles::new();
    let result = pdf_to_word_artifact(&state, multipart, &mut files).await;
    respond(&state, result, files).await
}

async fn pdf_to_word_artifact(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
    files: &mut RequestFiles,
) -> Result<ConvertedArtifact, AppError> {
    let mut form = collect_form(&state.staging, multipart, &PDF_TO_WORD, files).await?;
    let upload = single_upload(&mut form)?;

    let output = state
        .config
        .output_dir
        .join(upload.output_name(TargetFormat::Docx));
    let job = ConversionJob::single(&upload.path, TargetFormat::Docx, output);

    run_job(
        state.converters.pdf_to_word.as_ref(),
        &job,
        &PDF_TO_WORD,
        upload.download_name(TargetFormat::Docx),
        files,
    )
    .await
}

#[utoipa::path(
    post,
    path = "/convert/word-to-pdf",
    request_body(content = SingleFileForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Converted PDF attachment"),
        (status = 400, description = "Missing or invalid upload", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Conversion failed", body = ErrorResponse)
    ),
    tag = "convert"
)]
pub async fn word_to_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    info!("=== Word to PDF Conversion Request ===");
    let mut files = RequestFiles::new();
    let result = word_to_pdf_artifact(&state, multipart, &mut files).await;
    respond(&state, result, files).await
}

async fn word_to_pdf_artifact(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
    files: &mut RequestFiles,
) -> Result<ConvertedArtifact, AppError> {
    let mut form = collect_form(&state.staging, multipart, &WORD_TO_PDF, files).await?;
    let upload = single_upload(&mut form)?;

    // The office suite names its output after the input stem
    let output = state
        .config
        .output_dir
        .join(upload.output_name(TargetFormat::Pdf));
    let job = ConversionJob::single(&upload.path, TargetFormat::Pdf, output);

    run_job(
        state.converters.office.as_ref(),
        &job,
        &WORD_TO_PDF,
        upload.download_name(TargetFormat::Pdf),
        files,
    )
    .await
}

#[utoipa::path(
    post,
    path = "/convert/merge-pdf",
    request_body(content = BatchFileForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "merged_document.pdf attachment"),
        (status = 400, description = "Wrong file count or invalid upload", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Merge failed", body = ErrorResponse)
    ),
    tag = "convert"
)]
pub async fn merge_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    info!("=== PDF Merge Request ===");
    let mut files = RequestFiles::new();
    let result = merge_pdf_artifact(&state, multipart, &mut files).await;
    respond(&state, result, files).await
}

async fn merge_pdf_artifact(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
    files: &mut RequestFiles,
) -> Result<ConvertedArtifact, AppError> {
    let mut form = collect_form(&state.staging, multipart, &MERGE_PDF, files).await?;

    let file_count = form.file_count()?;
    if file_count < MIN_MERGE_FILES {
        return Err(AppError::Validation(
            "At least 2 PDF files are required for merging".to_string(),
        ));
    }
    if file_count > MAX_MERGE_FILES {
        return Err(AppError::Validation(MERGE_PDF.too_many.to_string()));
    }

    let mut inputs = Vec::with_capacity(file_count);
    for i in 0..file_count {
        let upload = form
            .take_upload(&format!("file_{}", i))
            .ok_or_else(|| AppError::Validation(format!("Missing file {}", i + 1)))?;
        inputs.push(upload.path);
    }
    info!("Merging {} PDF files", inputs.len());

    let output = state
        .config
        .output_dir
        .join(format!("merged_{}.pdf", Uuid::new_v4()));
    let job = ConversionJob::new(inputs, TargetFormat::Pdf, output);

    run_job(
        state.converters.merge.as_ref(),
        &job,
        &MERGE_PDF,
        "merged_document.pdf".to_string(),
        files,
    )
    .await
}

#[utoipa::path(
    post,
    path = "/convert/image-to-pdf",
    request_body(content = BatchFileForm, content_type = "multipart/form-data",
        description = "Either a single `file` part, or `file_count` with `file_0` … `file_<n-1>`"),
    responses(
        (status = 200, description = "PDF attachment with one page per image"),
        (status = 400, description = "Wrong file count or invalid upload", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "No image could be converted", body = ErrorResponse)
    ),
    tag = "convert"
)]
pub async fn image_to_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    info!("=== Image to PDF Conversion Request ===");
    let mut files = RequestFiles::new();
    let result = image_to_pdf_artifact(&state, multipart, &mut files).await;
    respond(&state, result, files).await
}

async fn image_to_pdf_artifact(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
    files: &mut RequestFiles,
) -> Result<ConvertedArtifact, AppError> {
    let mut form = collect_form(&state.staging, multipart, &IMAGE_TO_PDF, files).await?;

    let images: Vec<Upload> = match form.take_upload("file") {
        Some(upload) => vec![upload],
        None => {
            let file_count = form.file_count()?;
            if file_count == 0 {
                return Err(AppError::Validation("No files uploaded".to_string()));
            }
            if file_count > MAX_IMAGE_FILES {
                return Err(AppError::Validation(IMAGE_TO_PDF.too_many.to_string()));
            }
            (0..file_count)
                .filter_map(|i| form.take_upload(&format!("file_{}", i)))
                .collect()
        }
    };
    if images.is_empty() {
        return Err(AppError::Validation("No files uploaded".to_string()));
    }
    info!("Converting {} images to PDF", images.len());

    let download_name = match images.as_slice() {
        [only] => only.download_name(TargetFormat::Pdf),
        _ => "images_combined.pdf".to_string(),
    };
    let output = state
        .config
        .output_dir
        .join(format!("images_{}.pdf", Uuid::new_v4()));
    let inputs = images.into_iter().map(|upload| upload.path).collect();
    let job = ConversionJob::new(inputs, TargetFormat::Pdf, output);

    run_job(
        state.converters.images.as_ref(),
        &job,
        &IMAGE_TO_PDF,
        download_name,
        files,
    )
    .await
}

fn single_upload(form: &mut ConversionForm) -> Result<Upload, AppError> {
    form.take_upload("file")
        .ok_or_else(|| AppError::Validation("No file uploaded".to_string()))
}

/// Run `job` through `adapter` and describe the artifact it produced
async fn run_job(
    adapter: &dyn ConverterAdapter,
    job: &ConversionJob,
    spec: &RouteSpec,
    download_name: String,
    files: &mut RequestFiles,
) -> Result<ConvertedArtifact, AppError> {
    // Tracked up front so a half-written output is cleaned up too
    files.track(&job.output);

    info!("Running {} adapter", adapter.name());
    let produced = adapter
        .convert(job)
        .await
        .map_err(|e| AppError::conversion(spec.error_context, e))?;
    files.track(&produced);

    let size = match tokio::fs::metadata(&produced).await {
        Ok(metadata) => metadata.len(),
        Err(_) => {
            return Err(AppError::conversion(
                spec.error_context,
                ConversionError::MissingOutput(produced),
            ));
        }
    };
    if size == 0 {
        return Err(AppError::conversion(
            spec.error_context,
            ConversionError::OutputTooSmall { size, min: 1 },
        ));
    }

    Ok(ConvertedArtifact {
        path: produced,
        download_name,
        content_type: job.target.content_type(),
        size,
    })
}

/// Hand a successful artifact to delivery, or purge the request's files
async fn respond(
    state: &AppState,
    result: Result<ConvertedArtifact, AppError>,
    files: RequestFiles,
) -> Result<Response, AppError> {
    match result {
        Ok(artifact) => delivery::attachment(artifact, files, state.config.cleanup_grace()).await,
        Err(e) => {
            files.purge().await;
            Err(e)
        }
    }
}
