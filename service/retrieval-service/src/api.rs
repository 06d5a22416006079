//! Request/response types exposed to the transport layer.

use serde::{Deserialize, Serialize};

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// One ranked passage. `chunk_content` is the raw window text; `score` is the
/// fused score, adjustments included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub chunk_id: String,
    pub page_number: u32,
    pub section_title: String,
    pub chunk_content: String,
    pub score: f32,
    pub document_id: String,
    pub document_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub query: String,
    pub results: Vec<RetrievedPassage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildAck {
    pub status: String,
    pub chunks_total: usize,
    pub docs: Vec<String>,
    pub started_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub chunks: usize,
    pub docs: Vec<String>,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub doc_name: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDebug {
    pub id: String,
    pub page: u32,
    pub doc: String,
    pub title: String,
    pub words: usize,
    pub ctx: String,
}
