use super::{ConversionError, ConverterAdapter, ensure_output_size, run_blocking};
use crate::models::ConversionJob;
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use std::path::{Path, PathBuf};
use tracing::info;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in malformed files
const MAX_TREE_DEPTH: usize = 64;

const MIN_OUTPUT_BYTES: u64 = 50;

/// Concatenates PDFs in input order
pub struct PdfMerger;

#[async_trait::async_trait]
impl ConverterAdapter for PdfMerger {
    fn name(&self) -> &'static str {
        "pdf-merge"
    }

    async fn convert(&self, job: &ConversionJob) -> Result<PathBuf, ConversionError> {
        let inputs = job.inputs.clone();
        let output = job.output.clone();

        run_blocking(move || {
            info!("Merging {} PDF files", inputs.len());
            let page_count = merge_pdfs(&inputs, &output)?;
            ensure_output_size(&output, MIN_OUTPUT_BYTES)?;
            info!("✅ Merged {} pages into {}", page_count, output.display());
            Ok(output)
        })
        .await
    }
}

/// Merge `inputs` into `output`, returning the total page count
pub fn merge_pdfs(inputs: &[PathBuf], output: &Path) -> Result<usize, ConversionError> {
    if inputs.is_empty() {
        return Err(ConversionError::InvalidInput(
            "no PDF files to merge".to_string(),
        ));
    }

    let mut merged = Document::with_version("1.5");
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut max_id = 1;

    for (index, path) in inputs.iter().enumerate() {
        let position = index + 1;
        let mut doc = Document::load(path).map_err(|e| {
            ConversionError::InvalidInput(format!("Error processing PDF {}: {}", position, e))
        })?;

        let pages = doc.get_pages().len();
        if pages == 0 {
            return Err(ConversionError::InvalidInput(format!(
                "PDF file {} has no pages",
                position
            )));
        }
        info!("PDF {} has {} pages", position, pages);

        flatten_inherited_attributes(&mut doc);
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        // get_pages is keyed by page number, so this preserves reading order
        page_ids.extend(doc.get_pages().into_values());
        merged.objects.extend(
            doc.objects
                .into_iter()
                .filter(|(_, object)| !is_document_root(object)),
        );
    }

    merged.max_id = max_id;
    let pages_id = merged.new_object_id();

    for &page_id in &page_ids {
        if let Ok(page) = merged
            .get_object_mut(page_id)
            .and_then(|object| object.as_dict_mut())
        {
            page.set("Parent", pages_id);
        }
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_ids.len() as i64),
        }),
    );

    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);

    merged.compress();
    merged
        .save(output)
        .map_err(|e| ConversionError::Library(format!("failed to write merged PDF: {}", e)))?;

    Ok(page_ids.len())
}

/// Catalog and page-tree nodes of an input; replaced by the merged document's own
fn is_document_root(object: &Object) -> bool {
    match object {
        Object::Dictionary(dict) => matches!(
            dict.get(b"Type").and_then(|t| t.as_name()),
            Ok(b"Catalog") | Ok(b"Pages")
        ),
        _ => false,
    }
}

/// Copy inherited attributes onto every page so that discarding the old
/// page tree does not lose them.
fn flatten_inherited_attributes(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    for page_id in page_ids {
        let inherited = inherited_attributes(doc, page_id);
        if inherited.is_empty() {
            continue;
        }
        if let Ok(page) = doc
            .get_object_mut(page_id)
            .and_then(|object| object.as_dict_mut())
        {
            for (key, value) in inherited {
                page.set(key, value);
            }
        }
    }
}

fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let mut found = Vec::new();
    let Ok(page) = doc.get_dictionary(page_id) else {
        return found;
    };

    let mut missing: Vec<&'static [u8]> = INHERITABLE_KEYS
        .into_iter()
        .filter(|key| !page.has(key))
        .collect();
    let mut parent = parent_of(page);
    let mut depth = 0;

    while let Some(parent_id) = parent {
        if missing.is_empty() || depth >= MAX_TREE_DEPTH {
            break;
        }
        depth += 1;

        let Ok(node) = doc.get_dictionary(parent_id) else {
            break;
        };
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((*key, value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = parent_of(node);
    }

    found
}

fn parent_of(node: &Dictionary) -> Option<ObjectId> {
    node.get(b"Parent").and_then(|p| p.as_reference()).ok()
}
