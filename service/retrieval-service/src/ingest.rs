//! Full rebuild: scan, per-document cache-or-ingest, index construction.

use std::path::Path;

use embedding_provider::embedder::Embedder;
use passage_index::cache::CacheStore;
use passage_index::dense::DenseMatrix;
use passage_index::{ChunkIndex, PageIndex, Snapshot};
use passage_model::{DocumentId, DocumentInfo, PageRecord, PassageRecord};
use pdf_ingest::windower::{window_pages, WindowParams};
use pdf_ingest::{facts, page_parser, reader_pdf};
use tracing::{info, warn};

use crate::{ServiceError, SidecarConfig};

struct DocumentIngest {
    doc_id: DocumentId,
    doc_name: String,
    pages: Vec<PageRecord>,
    passages: Vec<PassageRecord>,
    vectors: Vec<Vec<f32>>,
}

pub(crate) fn run_rebuild(
    cfg: &SidecarConfig,
    embedder: &dyn Embedder,
) -> Result<Snapshot, ServiceError> {
    let cache = CacheStore::open(&cfg.cache_dir, &cfg.cache_version)
        .map_err(|err| ServiceError::Index(err.to_string()))?;
    let removed = cache.sweep_stale();
    if removed > 0 {
        info!(removed, "removed stale cache files");
    }

    let pdfs = pdf_ingest::scan_pdfs(&cfg.docs_dir)
        .map_err(|err| ServiceError::Ingest(err.to_string()))?;
    if pdfs.is_empty() {
        warn!(dir = %cfg.docs_dir.display(), "no PDF documents found");
    }

    let params = WindowParams {
        width: cfg.chunk_width,
        overlap: cfg.chunk_overlap,
        min_page_words: cfg.min_page_words,
        ..WindowParams::default()
    };

    let mut passages: Vec<PassageRecord> = Vec::new();
    let mut vectors: Vec<Vec<f32>> = Vec::new();
    let mut pages: Vec<PageRecord> = Vec::new();
    let mut documents: Vec<DocumentInfo> = Vec::new();

    for path in &pdfs {
        match ingest_document(path, &cache, embedder, &params) {
            Ok(doc) => {
                info!(
                    doc = %doc.doc_name,
                    chunks = doc.passages.len(),
                    pages = doc.pages.len(),
                    "document ready"
                );
                documents.push(DocumentInfo {
                    doc_id: doc.doc_id.clone(),
                    doc_name: doc.doc_name.clone(),
                    source_path: path.display().to_string(),
                    chunk_count: doc.passages.len(),
                });
                passages.extend(doc.passages);
                vectors.extend(doc.vectors);
                pages.extend(doc.pages);
            }
            // An embedder outage aborts the rebuild; the previous snapshot
            // stays live. Any other per-document failure just skips the file.
            Err(err @ ServiceError::Embed(_)) => return Err(err),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping document");
            }
        }
    }

    let chunk_index = ChunkIndex::build(passages, DenseMatrix::new(vectors))
        .map_err(|err| ServiceError::Index(err.to_string()))?;

    // Page embeddings are recomputed every rebuild; only chunk embeddings
    // are cached on disk.
    let page_texts: Vec<String> = pages.iter().map(PageIndex::index_text).collect();
    let page_refs: Vec<&str> = page_texts.iter().map(String::as_str).collect();
    let page_vectors = embedder
        .embed_batch(&page_refs)
        .map_err(|err| ServiceError::Embed(err.to_string()))?;
    let page_index = PageIndex::build(pages, DenseMatrix::new(page_vectors))
        .map_err(|err| ServiceError::Index(err.to_string()))?;

    info!(
        chunks = chunk_index.len(),
        pages = page_index.len(),
        docs = documents.len(),
        "indices rebuilt"
    );
    Ok(Snapshot {
        chunk_index,
        page_index,
        documents,
    })
}

fn ingest_document(
    path: &Path,
    cache: &CacheStore,
    embedder: &dyn Embedder,
    params: &WindowParams,
) -> Result<DocumentIngest, ServiceError> {
    let doc_id = pdf_ingest::doc_hash(path).map_err(|err| ServiceError::Ingest(err.to_string()))?;
    let doc_name = pdf_ingest::doc_name_from_path(path);
    let page_texts = reader_pdf::extract_page_texts(path)
        .map_err(|err| ServiceError::Ingest(err.to_string()))?;
    let pages = page_parser::parse_pages(&page_texts, &doc_id, &doc_name);

    if let Some((records, matrix)) = cache.load(&doc_id) {
        return Ok(DocumentIngest {
            doc_id,
            doc_name,
            pages,
            passages: records,
            vectors: matrix,
        });
    }

    info!(doc = %doc_name, id = %doc_id, pages = pages.len(), "ingesting document");
    let mut records = window_pages(&pages, params);
    for record in &mut records {
        record.contextual_content =
            facts::contextual_content(&record.section_title, &record.raw_content);
    }

    let texts: Vec<&str> = records
        .iter()
        .map(|record| record.contextual_content.as_str())
        .collect();
    let vectors = embedder
        .embed_batch(&texts)
        .map_err(|err| ServiceError::Embed(err.to_string()))?;

    if let Err(err) = cache.save(&doc_id, &records, &vectors) {
        warn!(doc = %doc_name, error = %err, "cache save failed");
    }

    Ok(DocumentIngest {
        doc_id,
        doc_name,
        pages,
        passages: records,
        vectors,
    })
}
