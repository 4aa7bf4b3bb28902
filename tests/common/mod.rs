#![allow(dead_code)]

use axum::Router;
use doc_converter::config::ConverterConfig;
use doc_converter::models::ConversionJob;
use doc_converter::services::converters::{ConversionError, ConverterAdapter, Converters};
use doc_converter::{AppState, create_app};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const BOUNDARY: &str = "---------------------------934857203948572039485720";

/// Hand-built multipart/form-data body
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                Content-Disposition: form-data; name=\"{name}\"\r\n\r\n\
                {value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }
}

/// A PDF with one page per entry of `widths`; each page's MediaBox width
/// identifies it, and the shared font resources live on the page tree root.
pub fn pdf_with_pages(widths: &[i64]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    for (index, &width) in widths.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Page {}", index + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => widths.len() as i64,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// MediaBox widths of every page, in page order
pub fn page_widths(pdf: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| {
            let page = doc.get_dictionary(id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            media_box[2].as_float().unwrap() as i64
        })
        .collect()
}

pub fn page_count(pdf: &[u8]) -> usize {
    Document::load_mem(pdf).unwrap().get_pages().len()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 30, 30, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .unwrap();
    bytes
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 30, 200]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Jpeg(90))
        .unwrap();
    bytes
}

/// Stands in for the office suite: writes a small PDF-looking file
pub struct StubOffice;

#[async_trait::async_trait]
impl ConverterAdapter for StubOffice {
    fn name(&self) -> &'static str {
        "stub-office"
    }

    async fn convert(&self, job: &ConversionJob) -> Result<PathBuf, ConversionError> {
        tokio::fs::write(&job.output, pdf_with_pages(&[612])).await?;
        Ok(job.output.clone())
    }
}

/// An office suite that leaves a partial file behind and then fails
pub struct FailingOffice;

#[async_trait::async_trait]
impl ConverterAdapter for FailingOffice {
    fn name(&self) -> &'static str {
        "failing-office"
    }

    async fn convert(&self, job: &ConversionJob) -> Result<PathBuf, ConversionError> {
        tokio::fs::write(&job.output, b"%PDF-1.4 partial").await?;
        Err(ConversionError::ProcessFailed {
            status: "exit status: 1".to_string(),
            stderr: "Error: source file could not be loaded".to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        false
    }
}

pub struct TestApp {
    pub app: Router,
    pub config: ConverterConfig,
    _root: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(|_| {}, Arc::new(StubOffice))
    }

    pub fn build(
        configure: impl FnOnce(&mut ConverterConfig),
        office: Arc<dyn ConverterAdapter>,
    ) -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = ConverterConfig::for_dirs(root.path());
        configure(&mut config);
        config.ensure_dirs().unwrap();

        let converters = Converters {
            office,
            ..Converters::from_config(&config)
        };
        let app = create_app(AppState::with_converters(config.clone(), converters));

        Self {
            app,
            config,
            _root: root,
        }
    }

    /// Number of entries left in the staging and output directories
    pub fn leftover_files(&self) -> usize {
        count_entries(&self.config.staging_dir) + count_entries(&self.config.output_dir)
    }
}

pub fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
