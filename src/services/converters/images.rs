use super::{ConversionError, ConverterAdapter, ensure_output_size, run_blocking};
use crate::models::ConversionJob;
use image::ColorType;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::path::{Path, PathBuf};
use tracing::{error, info};

// US Letter, in points
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
pub const MARGIN: f32 = 50.0;

const JPEG_QUALITY: u8 = 85;
const MIN_OUTPUT_BYTES: u64 = 50;

/// Where an image lands on its page, in points from the bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Scale `width`×`height` to fit inside the page margins, keeping the
/// aspect ratio, and centre it.
pub fn fit_on_page(width: u32, height: u32) -> Placement {
    let available_width = PAGE_WIDTH - 2.0 * MARGIN;
    let available_height = PAGE_HEIGHT - 2.0 * MARGIN;

    let scale = f32::min(
        available_width / width as f32,
        available_height / height as f32,
    );
    let scaled_width = width as f32 * scale;
    let scaled_height = height as f32 * scale;

    Placement {
        x: (PAGE_WIDTH - scaled_width) / 2.0,
        y: (PAGE_HEIGHT - scaled_height) / 2.0,
        width: scaled_width,
        height: scaled_height,
    }
}

/// One page per image, each image centred on a Letter page
pub struct ImageToPdfConverter;

#[async_trait::async_trait]
impl ConverterAdapter for ImageToPdfConverter {
    fn name(&self) -> &'static str {
        "image-to-pdf"
    }

    async fn convert(&self, job: &ConversionJob) -> Result<PathBuf, ConversionError> {
        let inputs = job.inputs.clone();
        let output = job.output.clone();

        run_blocking(move || {
            let pages = images_to_pdf(&inputs, &output)?;
            ensure_output_size(&output, MIN_OUTPUT_BYTES)?;
            info!(
                "✅ Combined {} of {} images into {}",
                pages,
                inputs.len(),
                output.display()
            );
            Ok(output)
        })
        .await
    }
}

struct EncodedImage {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
}

fn encode_as_jpeg(path: &Path) -> Result<EncodedImage, ConversionError> {
    let decoded = image::io::Reader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| ConversionError::InvalidInput(format!("cannot decode image: {}", e)))?;

    // JPEG has no alpha channel, so palette and RGBA images are flattened first
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder
        .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
        .map_err(|e| ConversionError::Library(format!("cannot encode image: {}", e)))?;

    Ok(EncodedImage {
        jpeg,
        width,
        height,
    })
}

fn add_image_page(
    doc: &mut Document,
    pages_id: ObjectId,
    image: EncodedImage,
) -> Result<ObjectId, ConversionError> {
    let placement = fit_on_page(image.width, image.height);

    let image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(image.width as i64),
            "Height" => Object::Integer(image.height as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => "DCTDecode",
        },
        image.jpeg,
    )
    .with_compression(false);
    let image_id = doc.add_object(image_stream);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(placement.width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(placement.height),
                    Object::Real(placement.x),
                    Object::Real(placement.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| ConversionError::Library(format!("cannot build page content: {}", e)))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(PAGE_WIDTH),
            Object::Real(PAGE_HEIGHT),
        ],
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
        "Contents" => content_id,
    }))
}

/// Write every decodable image in `inputs` as its own page of `output`.
///
/// Images that fail to decode are logged and skipped; the number of pages
/// written is returned. Fails only when no image could be used.
pub fn images_to_pdf(inputs: &[PathBuf], output: &Path) -> Result<usize, ConversionError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut page_ids: Vec<Object> = Vec::new();

    for (index, path) in inputs.iter().enumerate() {
        let encoded = match encode_as_jpeg(path) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("Error processing image {}: {}", index + 1, e);
                continue;
            }
        };
        let page_id = add_image_page(&mut doc, pages_id, encoded)?;
        page_ids.push(page_id.into());
    }

    if page_ids.is_empty() {
        return Err(ConversionError::NoUsableInput(
            "No images could be processed".to_string(),
        ));
    }

    let count = page_ids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids,
            "Count" => Object::Integer(count as i64),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.compress();
    doc.save(output)
        .map_err(|e| ConversionError::Library(format!("failed to write PDF: {}", e)))?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 0.01,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_fit_landscape_image() {
        // width-bound: 512pt available
        let placement = fit_on_page(1024, 512);
        assert_close(placement.width, 512.0);
        assert_close(placement.height, 256.0);
        assert_close(placement.x, 50.0);
        assert_close(placement.y, 268.0);
    }

    #[test]
    fn test_fit_portrait_image() {
        // height-bound: 692pt available
        let placement = fit_on_page(100, 692);
        assert_close(placement.height, 692.0);
        assert_close(placement.width, 100.0);
        assert_close(placement.x, 256.0);
        assert_close(placement.y, 50.0);
    }

    #[test]
    fn test_fit_keeps_aspect_ratio() {
        let placement = fit_on_page(640, 480);
        assert_close(placement.width / placement.height, 640.0 / 480.0);
        assert!(placement.x >= MARGIN && placement.y >= MARGIN);
    }

    #[test]
    fn test_skips_undecodable_images() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        let bad = dir.path().join("bad.png");
        image::RgbaImage::from_pixel(8, 4, image::Rgba([10, 20, 30, 128]))
            .save(&good)
            .unwrap();
        std::fs::write(&bad, b"definitely not a png").unwrap();

        let output = dir.path().join("out.pdf");
        let pages = images_to_pdf(&[bad, good], &output).unwrap();
        assert_eq!(pages, 1);
        assert_eq!(Document::load(&output).unwrap().get_pages().len(), 1);
    }

    #[test]
    fn test_all_images_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.jpg");
        std::fs::write(&bad, b"nope").unwrap();

        let result = images_to_pdf(&[bad], &dir.path().join("out.pdf"));
        assert!(matches!(result, Err(ConversionError::NoUsableInput(_))));
    }
}
