use std::path::Path;

/// Longest sanitized filename, in bytes. Staging prepends a 37-byte
/// `<uuid>_` and outputs may swap in a longer extension, all of which has to
/// stay under the usual 255-byte name limit.
pub const MAX_FILENAME_LEN: usize = 200;

/// Declared category of an uploaded file, each with a fixed extension allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Pdf,
    Word,
    Image,
}

impl FileCategory {
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            FileCategory::Pdf => &["pdf"],
            FileCategory::Word => &["doc", "docx"],
            FileCategory::Image => &["jpg", "jpeg", "png"],
        }
    }

    pub fn rejection_message(&self) -> &'static str {
        match self {
            FileCategory::Pdf => "Only PDF files are allowed",
            FileCategory::Word => "Only Word documents (.doc, .docx) are allowed",
            FileCategory::Image => "Only images (JPG, JPEG, PNG) are allowed",
        }
    }

    /// Check whether `filename` carries an extension from this category's allow-list
    pub fn allows(&self, filename: &str) -> bool {
        file_extension(filename)
            .is_some_and(|ext| self.allowed_extensions().contains(&ext.as_str()))
    }
}

/// Lower-cased text after the last dot, if any
pub fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Filename without directories and without its last extension
pub fn original_stem(filename: &str) -> &str {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Reduce a client-supplied filename to a safe on-disk name.
///
/// Directory components are dropped and every character outside
/// `[A-Za-z0-9._-]` becomes `_`. Leading dots are removed so the result is
/// never hidden, and an empty result falls back to `upload`. Over-long
/// names lose the end of their stem, never their extension.
pub fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    // Windows clients may still send backslash paths
    let name = name.rsplit('\\').next().unwrap_or(name);

    if filename.contains("..") {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.trim_start_matches('.');
    // Only ASCII remains, so byte offsets are char boundaries
    let mut sanitized = if sanitized.len() <= MAX_FILENAME_LEN {
        sanitized.to_string()
    } else {
        match sanitized.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && ext.len() < MAX_FILENAME_LEN / 2 => {
                format!("{}.{}", &stem[..MAX_FILENAME_LEN - ext.len() - 1], ext)
            }
            _ => sanitized[..MAX_FILENAME_LEN].to_string(),
        }
    };

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '_') {
        sanitized = "upload".to_string();
    }
    sanitized
}
