//! Per-page raw text extraction backed by `lopdf`.

use std::path::Path;

use lopdf::Document;
use tracing::warn;

use crate::IngestError;

/// Extract the raw text of every physical page, preserving line breaks.
///
/// Pages whose content streams cannot be decoded yield an empty string so
/// downstream page numbering stays aligned with the physical document.
pub fn extract_page_texts(path: &Path) -> Result<Vec<String>, IngestError> {
    let doc = Document::load(path).map_err(|err| IngestError::Pdf {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut texts = Vec::new();
    for (&page_num, _) in doc.get_pages().iter() {
        match doc.extract_text(&[page_num]) {
            Ok(text) => texts.push(text),
            Err(err) => {
                warn!(page = page_num, path = %path.display(), error = %err, "page text extraction failed");
                texts.push(String::new());
            }
        }
    }
    Ok(texts)
}
