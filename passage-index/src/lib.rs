//! In-memory retrieval indices and their on-disk cache.
//!
//! A [`ChunkIndex`] pairs a BM25 structure with an embedding matrix over the
//! same contextual strings; a [`PageIndex`] is the parallel structure at page
//! granularity. Both are bundled into an immutable [`Snapshot`] that the
//! ingestion controller publishes atomically.

pub mod bm25_index;
pub mod cache;
pub mod dense;
pub mod npy;

use std::path::PathBuf;

use passage_model::{DocumentInfo, PageRecord, PassageRecord};

use crate::bm25_index::Bm25Index;
use crate::dense::DenseMatrix;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index size mismatch: {records} records vs {rows} embedding rows")]
    RowMismatch { records: usize, rows: usize },
    #[error("io error at `{path}`: {message}")]
    Io { path: PathBuf, message: String },
    #[error("corrupt artefact `{path}`: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Chunk-level index: BM25 + dense matrix over `contextual_content`.
#[derive(Debug)]
pub struct ChunkIndex {
    passages: Vec<PassageRecord>,
    bm25: Bm25Index,
    embeddings: DenseMatrix,
}

impl ChunkIndex {
    pub fn build(
        passages: Vec<PassageRecord>,
        embeddings: DenseMatrix,
    ) -> Result<Self, IndexError> {
        if passages.len() != embeddings.rows() {
            return Err(IndexError::RowMismatch {
                records: passages.len(),
                rows: embeddings.rows(),
            });
        }
        let bm25 = Bm25Index::build(passages.iter().map(|p| p.contextual_content.as_str()));
        Ok(Self {
            passages,
            bm25,
            embeddings,
        })
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn passages(&self) -> &[PassageRecord] {
        &self.passages
    }

    pub fn get(&self, ordinal: usize) -> Option<&PassageRecord> {
        self.passages.get(ordinal)
    }

    pub fn embeddings(&self) -> &DenseMatrix {
        &self.embeddings
    }

    /// BM25 scores for every matching passage, keyed by ordinal.
    pub fn lexical_scores(&self, query: &str) -> Vec<(usize, f32)> {
        self.bm25.scores(query, self.passages.len())
    }

    /// Cosine similarity of the query vector against every passage embedding.
    pub fn dense_scores(&self, query_vec: &[f32]) -> Vec<(usize, f32)> {
        self.embeddings.scores(query_vec)
    }
}

/// Page-level index over `"[<title>] <text>"`, used for rescue only.
pub struct PageIndex {
    pages: Vec<PageRecord>,
    bm25: Bm25Index,
    embeddings: DenseMatrix,
}

/// How many pages the lexical side of a page-level search fetches.
pub const PAGE_FETCH_DEPTH: usize = 20;

impl PageIndex {
    /// The exact string a page is indexed (and embedded) under.
    pub fn index_text(page: &PageRecord) -> String {
        format!("[{}] {}", page.title, page.text)
    }

    pub fn build(pages: Vec<PageRecord>, embeddings: DenseMatrix) -> Result<Self, IndexError> {
        if pages.len() != embeddings.rows() {
            return Err(IndexError::RowMismatch {
                records: pages.len(),
                rows: embeddings.rows(),
            });
        }
        let texts: Vec<String> = pages.iter().map(Self::index_text).collect();
        let bm25 = Bm25Index::build(texts.iter().map(String::as_str));
        Ok(Self {
            pages,
            bm25,
            embeddings,
        })
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, ordinal: usize) -> Option<&PageRecord> {
        self.pages.get(ordinal)
    }

    pub fn lexical_scores(&self, query: &str) -> Vec<(usize, f32)> {
        self.bm25.scores(query, PAGE_FETCH_DEPTH.min(self.pages.len()))
    }

    pub fn dense_scores(&self, query_vec: &[f32]) -> Vec<(usize, f32)> {
        self.embeddings.scores(query_vec)
    }
}

/// Immutable index snapshot published as a unit by each rebuild.
pub struct Snapshot {
    pub chunk_index: ChunkIndex,
    pub page_index: PageIndex,
    pub documents: Vec<DocumentInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use passage_model::{ChunkId, DocumentId};

    fn passage(ordinal: usize, text: &str) -> PassageRecord {
        let doc_id = DocumentId("cafebabe00000000".into());
        PassageRecord {
            chunk_id: ChunkId::for_passage(&doc_id, ordinal),
            doc_id,
            doc_name: "Doc".into(),
            page_num: 1,
            section_title: "Section 1: Test".into(),
            raw_content: text.into(),
            contextual_content: format!("[Section 1: Test] {text}"),
        }
    }

    #[test]
    fn chunk_index_rejects_row_mismatch() {
        let err = ChunkIndex::build(
            vec![passage(0, "hello world")],
            DenseMatrix::new(vec![vec![0.0; 4], vec![0.0; 4]]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IndexError::RowMismatch {
                records: 1,
                rows: 2
            }
        ));
    }

    #[test]
    fn chunk_index_aligns_rows_with_passages() {
        let index = ChunkIndex::build(
            vec![passage(0, "ballots"), passage(1, "tabulators")],
            DenseMatrix::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]]),
        )
        .unwrap();
        assert_eq!(index.len(), 2);
        let dense = index.dense_scores(&[1.0, 0.0]);
        assert_eq!(dense.len(), 2);
        assert!(dense[0].1 > dense[1].1);
    }
}
