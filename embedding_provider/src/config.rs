use std::path::PathBuf;

use crate::embedder::{HashEmbedderConfig, OnnxLocalConfig};

/// Default settings for the local ONNX embedder.
#[derive(Debug, Clone, Copy)]
pub struct OnnxLocalDefaults {
    pub model_path: &'static str,
    pub tokenizer_path: &'static str,
    pub runtime_library_path: &'static str,
    pub embedding_dimension: usize,
    pub max_input_tokens: usize,
    pub model_id: &'static str,
}

/// Shared defaults so the CLI, service and tests stay in sync.
pub const ONNX_LOCAL_DEFAULTS: OnnxLocalDefaults = OnnxLocalDefaults {
    model_path: "models/pplx-embed-v1-onnx/model.onnx",
    tokenizer_path: "models/pplx-embed-v1-onnx/tokenizer.json",
    runtime_library_path: "bin/onnxruntime/lib/libonnxruntime.so",
    embedding_dimension: 1024,
    max_input_tokens: 8192,
    model_id: "pplx-embed-v1-onnx",
};

/// Build an [`OnnxLocalConfig`] from the shared defaults.
///
/// Asset paths resolve relative to this crate's directory so the embedder
/// loads regardless of the current working directory.
pub fn default_onnx_config() -> OnnxLocalConfig {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    OnnxLocalConfig {
        model_path: base.join(ONNX_LOCAL_DEFAULTS.model_path),
        tokenizer_path: base.join(ONNX_LOCAL_DEFAULTS.tokenizer_path),
        runtime_library_path: base.join(ONNX_LOCAL_DEFAULTS.runtime_library_path),
        dimension: ONNX_LOCAL_DEFAULTS.embedding_dimension,
        max_input_length: ONNX_LOCAL_DEFAULTS.max_input_tokens,
        model_id: ONNX_LOCAL_DEFAULTS.model_id.into(),
    }
}

/// Hash-embedder defaults matching the ONNX model's shape, for offline runs.
pub fn default_hash_config() -> HashEmbedderConfig {
    HashEmbedderConfig {
        dimension: ONNX_LOCAL_DEFAULTS.embedding_dimension,
        max_input_length: usize::MAX,
        model_id: format!("{}-hash", ONNX_LOCAL_DEFAULTS.model_id),
    }
}
