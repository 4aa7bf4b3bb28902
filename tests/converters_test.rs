mod common;

use common::{jpeg_bytes, page_count, page_widths, pdf_with_pages, png_bytes};
use doc_converter::models::{ConversionJob, TargetFormat};
use doc_converter::services::converters::pdf_to_word::validate_docx;
use doc_converter::services::converters::{
    ConversionError, ConverterAdapter, ImageToPdfConverter, PdfMerger, PdfToWordConverter,
};
use lopdf::{Document, Object, dictionary};
use std::io::Read;
use std::path::{Path, PathBuf};

fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn empty_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Vec::<Object>::new(),
        "Count" => 0,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[tokio::test]
async fn test_pdf_to_word_writes_one_section_per_page() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.pdf", &pdf_with_pages(&[612, 612, 612]));
    let output = dir.path().join("out.docx");

    let job = ConversionJob::single(&input, TargetFormat::Docx, output.clone());
    let produced = PdfToWordConverter.convert(&job).await.unwrap();
    assert_eq!(produced, output);
    validate_docx(&produced).unwrap();

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&produced).unwrap()).unwrap();
    let mut document = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut document)
        .unwrap();
    // two breaks separate three pages
    assert_eq!(document.matches(r#"w:type="page""#).count(), 2);
}

#[tokio::test]
async fn test_pdf_to_word_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.pdf", b"this is not a pdf");
    let job = ConversionJob::single(&input, TargetFormat::Docx, dir.path().join("out.docx"));

    assert!(PdfToWordConverter.convert(&job).await.is_err());
}

#[tokio::test]
async fn test_pdf_to_word_rejects_zero_pages() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.pdf", &empty_pdf());
    let job = ConversionJob::single(&input, TargetFormat::Docx, dir.path().join("out.docx"));

    let err = PdfToWordConverter.convert(&job).await.unwrap_err();
    assert!(matches!(err, ConversionError::InvalidInput(_)));
}

#[tokio::test]
async fn test_merge_sums_pages() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        write(dir.path(), "a.pdf", &pdf_with_pages(&[101, 102])),
        write(dir.path(), "b.pdf", &pdf_with_pages(&[201])),
        write(dir.path(), "c.pdf", &pdf_with_pages(&[301, 302, 303])),
        write(dir.path(), "d.pdf", &pdf_with_pages(&[401])),
    ];
    let output = dir.path().join("merged.pdf");

    let job = ConversionJob::new(inputs, TargetFormat::Pdf, output.clone());
    PdfMerger.convert(&job).await.unwrap();

    let merged = std::fs::read(&output).unwrap();
    assert_eq!(page_count(&merged), 7);
    assert_eq!(page_widths(&merged), vec![101, 102, 201, 301, 302, 303, 401]);
}

#[tokio::test]
async fn test_merge_keeps_inherited_resources() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        write(dir.path(), "a.pdf", &pdf_with_pages(&[100])),
        write(dir.path(), "b.pdf", &pdf_with_pages(&[200])),
    ];
    let output = dir.path().join("merged.pdf");
    PdfMerger
        .convert(&ConversionJob::new(inputs, TargetFormat::Pdf, output.clone()))
        .await
        .unwrap();

    let doc = Document::load(&output).unwrap();
    for page_id in doc.get_pages().into_values() {
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.has(b"Resources"), "page {:?} lost its resources", page_id);
    }
}

#[tokio::test]
async fn test_merge_rejects_page_less_input() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        write(dir.path(), "a.pdf", &pdf_with_pages(&[100])),
        write(dir.path(), "b.pdf", &empty_pdf()),
    ];
    let job = ConversionJob::new(inputs, TargetFormat::Pdf, dir.path().join("merged.pdf"));

    let err = PdfMerger.convert(&job).await.unwrap_err();
    assert_eq!(err.to_string(), "PDF file 2 has no pages");
}

#[tokio::test]
async fn test_images_one_page_each() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        write(dir.path(), "a.png", &png_bytes(300, 100)),
        write(dir.path(), "b.jpg", &jpeg_bytes(100, 300)),
        // extension lies; the decoder goes by content
        write(dir.path(), "c.jpg", &png_bytes(50, 50)),
    ];
    let output = dir.path().join("images.pdf");

    ImageToPdfConverter
        .convert(&ConversionJob::new(inputs, TargetFormat::Pdf, output.clone()))
        .await
        .unwrap();

    let pdf = std::fs::read(&output).unwrap();
    assert_eq!(page_count(&pdf), 3);
    assert_eq!(page_widths(&pdf), vec![612, 612, 612]);
}

#[tokio::test]
async fn test_images_none_usable() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        write(dir.path(), "a.png", b"nope"),
        write(dir.path(), "b.jpg", b"still nope"),
    ];
    let job = ConversionJob::new(inputs, TargetFormat::Pdf, dir.path().join("out.pdf"));

    let err = ImageToPdfConverter.convert(&job).await.unwrap_err();
    assert_eq!(err.to_string(), "No images could be processed");
    assert!(!dir.path().join("out.pdf").exists());
}
