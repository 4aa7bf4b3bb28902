use super::{ConversionError, ConverterAdapter, ensure_output_size, run_blocking, single_input};
use crate::models::ConversionJob;
use lopdf::Document;
use quick_xml::escape::escape;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const DOCUMENT_PART: &str = "word/document.xml";
const RELATIONSHIPS_PART: &str = "_rels/.rels";

const MIN_DOCUMENT_XML_BYTES: u64 = 50;
const MIN_DOCX_BYTES: u64 = 100;

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELATIONSHIPS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const PAGE_BREAK: &str = r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#;

// US Letter in twentieths of a point, one-inch margins
const SECTION_PROPERTIES: &str = r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr>"#;

/// PDF → DOCX conversion on top of lopdf text extraction
pub struct PdfToWordConverter;

#[async_trait::async_trait]
impl ConverterAdapter for PdfToWordConverter {
    fn name(&self) -> &'static str {
        "pdf-to-word"
    }

    async fn convert(&self, job: &ConversionJob) -> Result<PathBuf, ConversionError> {
        let input = single_input(job)?.to_path_buf();
        let output = job.output.clone();

        run_blocking(move || {
            info!("=== Starting PDF to DOCX conversion ===");
            info!("Input PDF: {}", input.display());
            info!("Output DOCX: {}", output.display());

            let pages = extract_pages(&input)?;
            write_docx(&output, &pages)?;
            validate_docx(&output)?;

            info!("✅ PDF to DOCX conversion successful: {}", output.display());
            Ok(output)
        })
        .await
    }
}

/// Text of every page, in page order
fn extract_pages(path: &Path) -> Result<Vec<String>, ConversionError> {
    let input_size = std::fs::metadata(path)?.len();
    if input_size == 0 {
        return Err(ConversionError::InvalidInput(format!(
            "Input PDF file is empty: {}",
            path.display()
        )));
    }

    let doc = Document::load(path)
        .map_err(|e| ConversionError::Library(format!("failed to read PDF: {}", e)))?;
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(ConversionError::InvalidInput(
            "PDF file has no pages".to_string(),
        ));
    }
    info!("Input PDF has {} pages ({} bytes)", page_numbers.len(), input_size);

    Ok(page_numbers
        .iter()
        .map(|&number| match doc.extract_text(&[number]) {
            Ok(text) => text,
            Err(e) => {
                warn!("Could not extract text from page {}: {}", number, e);
                String::new()
            }
        })
        .collect())
}

/// Render `word/document.xml`: one paragraph per text line, a page break between pages
pub fn render_document_xml(pages: &[String]) -> String {
    let mut body = String::new();

    for (index, page) in pages.iter().enumerate() {
        if index > 0 {
            body.push_str(PAGE_BREAK);
        }
        let mut wrote_line = false;
        for line in page.lines() {
            let line: String = line
                .trim_end()
                .chars()
                .filter(|c| *c == '\t' || !c.is_control())
                .collect();
            if line.is_empty() {
                body.push_str("<w:p/>");
            } else {
                body.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
                body.push_str(&escape(line.as_str()));
                body.push_str("</w:t></w:r></w:p>");
            }
            wrote_line = true;
        }
        if !wrote_line {
            body.push_str("<w:p/>");
        }
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            "<w:body>{}{}</w:body></w:document>"
        ),
        body, SECTION_PROPERTIES
    )
}

fn write_docx(path: &Path, pages: &[String]) -> Result<(), ConversionError> {
    if path.exists() {
        std::fs::remove_file(path)?;
        info!("Removed existing output file: {}", path.display());
    }

    let zip_error = |e: zip::result::ZipError| {
        ConversionError::Library(format!("failed to write DOCX package: {}", e))
    };

    let mut zip = ZipWriter::new(File::create(path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(CONTENT_TYPES_PART, options)
        .map_err(zip_error)?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

    zip.start_file(RELATIONSHIPS_PART, options)
        .map_err(zip_error)?;
    zip.write_all(RELATIONSHIPS_XML.as_bytes())?;

    zip.start_file(DOCUMENT_PART, options).map_err(zip_error)?;
    zip.write_all(render_document_xml(pages).as_bytes())?;

    zip.finish().map_err(zip_error)?;
    Ok(())
}

/// Structural check of a produced DOCX: a zip holding both mandatory parts
/// with a non-trivial main document.
pub fn validate_docx(path: &Path) -> Result<(), ConversionError> {
    ensure_output_size(path, MIN_DOCX_BYTES)?;

    info!("Validating DOCX file structure...");
    let mut archive = ZipArchive::new(File::open(path)?).map_err(|e| {
        ConversionError::MalformedOutput(format!("Generated DOCX is not a valid ZIP file: {}", e))
    })?;

    let names: HashSet<&str> = archive.file_names().collect();
    let missing: Vec<&str> = [CONTENT_TYPES_PART, DOCUMENT_PART]
        .into_iter()
        .filter(|part| !names.contains(part))
        .collect();
    if !missing.is_empty() {
        return Err(ConversionError::MalformedOutput(format!(
            "DOCX missing essential files: {:?}",
            missing
        )));
    }
    info!("DOCX contains {} files", names.len());
    drop(names);

    let document_size = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| {
            ConversionError::MalformedOutput(
                "Could not read word/document.xml - DOCX is corrupted".to_string(),
            )
        })?
        .size();
    if document_size < MIN_DOCUMENT_XML_BYTES {
        return Err(ConversionError::MalformedOutput(
            "Document XML is too small - likely corrupted".to_string(),
        ));
    }

    info!("✅ DOCX structure validation passed ({} byte document)", document_size);
    Ok(())
}
