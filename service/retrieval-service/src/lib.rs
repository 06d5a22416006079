//! Retrieval sidecar core: ingestion control, atomic snapshot publication
//! and the hybrid query pipeline.
//!
//! The live index is an immutable [`Snapshot`] behind a single slot; a
//! rebuild assembles the next snapshot off to the side and publishes it with
//! one store, so readers always observe the chunk index, page index and
//! document list together.

pub mod api;
mod ingest;
pub mod llm;
pub mod retriever;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use embedding_provider::embedder::Embedder;
use passage_index::Snapshot;
use tracing::{error, info};

use crate::api::{ChunkDebug, DocumentSummary, HealthReport, RebuildAck, RetrievedPassage};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("knowledge base not loaded yet")]
    IndexNotReady,
    #[error("rebuild already in progress")]
    RebuildInProgress,
    #[error("embedding backend failure: {0}")]
    Embed(String),
    #[error("ingest failure: {0}")]
    Ingest(String),
    #[error("index failure: {0}")]
    Index(String),
}

#[derive(Debug, Clone)]
pub struct SidecarConfig {
    /// Directory scanned (recursively) for `*.pdf` sources.
    pub docs_dir: PathBuf,
    /// Directory holding the per-document chunk/embedding cache.
    pub cache_dir: PathBuf,
    /// Tag baked into cache file names; bump on any semantic change to the
    /// embedding model, window geometry or fact extraction.
    pub cache_version: String,
    pub chunk_width: usize,
    pub chunk_overlap: usize,
    pub min_page_words: usize,
    pub final_top_k: usize,
    pub fusion_weight_lexical: f32,
    pub fusion_weight_dense: f32,
    /// Page-level rescue engages below this top fused score.
    pub low_score_threshold: f32,
    /// Result slots held back from primary fill for keyword rescue.
    pub reserved_rescue_slots: usize,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            cache_dir: PathBuf::from(".cache"),
            cache_version: "embed-v1-280w".into(),
            chunk_width: 280,
            chunk_overlap: 60,
            min_page_words: 40,
            final_top_k: 15,
            fusion_weight_lexical: 0.5,
            fusion_weight_dense: 0.5,
            low_score_threshold: 0.6,
            reserved_rescue_slots: 5,
        }
    }
}

pub struct RetrievalSidecar {
    cfg: SidecarConfig,
    embedder: Arc<dyn Embedder>,
    live: RwLock<Option<Arc<Snapshot>>>,
    rebuilding: AtomicBool,
}

impl RetrievalSidecar {
    pub fn new(cfg: SidecarConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            cfg,
            embedder,
            live: RwLock::new(None),
            rebuilding: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SidecarConfig {
        &self.cfg
    }

    /// The currently published snapshot, if any rebuild has completed.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.live.read().unwrap().clone()
    }

    /// Run the query pipeline against the live snapshot.
    pub fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, ServiceError> {
        if query.trim().is_empty() {
            return Err(ServiceError::EmptyQuery);
        }
        let snapshot = self
            .snapshot()
            .filter(|snapshot| !snapshot.chunk_index.is_empty())
            .ok_or(ServiceError::IndexNotReady)?;
        retriever::retrieve(
            &snapshot,
            self.embedder.as_ref(),
            &self.cfg,
            query,
            top_k.max(1),
        )
    }

    /// Rebuild synchronously and publish the new snapshot.
    pub fn rebuild(&self) -> Result<RebuildAck, ServiceError> {
        self.acquire_rebuild_flag()?;
        let outcome = self.rebuild_and_publish();
        self.rebuilding.store(false, Ordering::SeqCst);
        outcome.map(|chunks_total| RebuildAck {
            status: "rebuilt".into(),
            chunks_total,
            docs: self.document_names(),
            started_at: Utc::now().to_rfc3339(),
        })
    }

    /// Trigger a rebuild on a dedicated worker thread.
    ///
    /// The acknowledgement carries the chunk total of the snapshot that is
    /// live at trigger time; readers keep that snapshot until the worker
    /// publishes the new one.
    pub fn rebuild_in_background(self: Arc<Self>) -> Result<RebuildAck, ServiceError> {
        self.acquire_rebuild_flag()?;
        let ack = RebuildAck {
            status: "rebuild started".into(),
            chunks_total: self.chunk_total(),
            docs: self.document_names(),
            started_at: Utc::now().to_rfc3339(),
        };
        let worker = Arc::clone(&self);
        std::thread::spawn(move || {
            if let Err(err) = worker.rebuild_and_publish() {
                error!(error = %err, "background rebuild failed, previous snapshot stays live");
            }
            worker.rebuilding.store(false, Ordering::SeqCst);
        });
        Ok(ack)
    }

    fn acquire_rebuild_flag(&self) -> Result<(), ServiceError> {
        self.rebuilding
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| ServiceError::RebuildInProgress)
    }

    fn rebuild_and_publish(&self) -> Result<usize, ServiceError> {
        let snapshot = ingest::run_rebuild(&self.cfg, self.embedder.as_ref())?;
        let total = snapshot.chunk_index.len();
        *self.live.write().unwrap() = Some(Arc::new(snapshot));
        info!(chunks = total, "published new index snapshot");
        Ok(total)
    }

    fn chunk_total(&self) -> usize {
        self.snapshot().map_or(0, |snapshot| snapshot.chunk_index.len())
    }

    fn document_names(&self) -> Vec<String> {
        self.snapshot().map_or_else(Vec::new, |snapshot| {
            snapshot
                .documents
                .iter()
                .map(|doc| doc.doc_name.clone())
                .collect()
        })
    }

    pub fn health(&self) -> HealthReport {
        let chunks = self.chunk_total();
        HealthReport {
            status: if chunks > 0 { "ok" } else { "loading" }.into(),
            chunks,
            docs: self.document_names(),
            model: self.embedder.info().model_id.clone(),
            cache_dir: self.cfg.cache_dir.display().to_string(),
        }
    }

    pub fn documents(&self) -> Vec<DocumentSummary> {
        self.snapshot().map_or_else(Vec::new, |snapshot| {
            snapshot
                .documents
                .iter()
                .map(|doc| DocumentSummary {
                    doc_id: doc.doc_id.0.clone(),
                    doc_name: doc.doc_name.clone(),
                    chunks: doc.chunk_count,
                })
                .collect()
        })
    }

    /// Debug listing of every indexed chunk, contextual content truncated.
    pub fn chunks_debug(&self) -> Vec<ChunkDebug> {
        self.snapshot().map_or_else(Vec::new, |snapshot| {
            snapshot
                .chunk_index
                .passages()
                .iter()
                .map(|passage| ChunkDebug {
                    id: passage.chunk_id.0.clone(),
                    page: passage.page_num,
                    doc: passage.doc_name.clone(),
                    title: passage.section_title.clone(),
                    words: passage.raw_content.split_whitespace().count(),
                    ctx: passage.contextual_content.chars().take(150).collect(),
                })
                .collect()
        })
    }
}
