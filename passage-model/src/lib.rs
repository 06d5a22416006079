//! Shared models used across crates

use serde::{Deserialize, Serialize};

/// Stable identifier for a source document: lowercase hex of the first
/// 8 bytes of the SHA-256 over its file content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

/// Identifier for a passage, unique across the whole corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub String);

impl ChunkId {
    /// Id for the `ordinal`-th passage of a document.
    pub fn for_passage(doc_id: &DocumentId, ordinal: usize) -> Self {
        Self(format!("{}#{}", doc_id.0, ordinal))
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One physical page after boilerplate stripping and heading inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub doc_id: DocumentId,
    pub doc_name: String,
    /// 1-based page number within the document.
    pub page_num: u32,
    /// Composite `"<section> > <subsection>"` title, or just the section.
    pub title: String,
    /// Single-spaced page text with running headers and footers removed.
    pub text: String,
}

/// A sliding-window slice of a single page, the unit of retrieval.
///
/// `raw_content` is the word-joined window; `contextual_content` is the
/// fact-prefixed form that lexical and dense indices are built over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageRecord {
    pub chunk_id: ChunkId,
    pub doc_id: DocumentId,
    pub doc_name: String,
    pub page_num: u32,
    pub section_title: String,
    pub raw_content: String,
    pub contextual_content: String,
}

/// Summary of one ingested document, carried inside a published snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub doc_id: DocumentId,
    pub doc_name: String,
    pub source_path: String,
    pub chunk_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_embed_document_and_ordinal() {
        let doc = DocumentId("a1b2c3d4e5f60718".into());
        assert_eq!(ChunkId::for_passage(&doc, 0).0, "a1b2c3d4e5f60718#0");
        assert_eq!(ChunkId::for_passage(&doc, 12).0, "a1b2c3d4e5f60718#12");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ChunkId("abc#3".into());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc#3\"");
    }
}
