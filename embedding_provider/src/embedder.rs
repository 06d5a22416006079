use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use ndarray::Array2;
use ort::{session::Session, value::Tensor};
use thiserror::Error;
use tokenizers::Tokenizer;

/// Identifies the backing implementation that powers an embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OnnxLocal,
    SeededHash,
}

/// Static metadata describing a particular embedder instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderInfo {
    pub provider: ProviderKind,
    pub model_id: String,
    pub dimension: usize,
}

/// Errors that can be produced by embedder operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmbedderError {
    #[error("invalid embedder configuration: {message}")]
    InvalidConfiguration { message: String },
    #[error("input exceeds max length of {max_length}, actual length: {actual_length}")]
    InputTooLong {
        max_length: usize,
        actual_length: usize,
    },
    #[error("provider failure: {message}")]
    ProviderFailure { message: String },
}

/// Core interface for all embedder implementations.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;
    fn info(&self) -> &EmbedderInfo;
}

/// Configuration for a local ONNX embedder loaded through the ONNX Runtime
/// shared library.
#[derive(Debug, Clone)]
pub struct OnnxLocalConfig {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub runtime_library_path: PathBuf,
    pub dimension: usize,
    pub max_input_length: usize,
    pub model_id: String,
}

/// Mean-pooling sentence embedder over a local ONNX encoder.
#[derive(Debug)]
pub struct OnnxLocalEmbedder {
    info: EmbedderInfo,
    session: Mutex<Session>,
    tokenizer: Arc<Tokenizer>,
    pad_id: i64,
    max_input_length: usize,
}

static ORT_RUNTIME_PATH: OnceLock<PathBuf> = OnceLock::new();

fn ensure_ort_initialized(runtime_library_path: &Path) -> Result<(), EmbedderError> {
    if let Some(existing) = ORT_RUNTIME_PATH.get() {
        if existing.as_path() != runtime_library_path {
            return Err(EmbedderError::InvalidConfiguration {
                message: format!(
                    "ONNX Runtime already initialized with `{}`; cannot switch to `{}`",
                    existing.display(),
                    runtime_library_path.display()
                ),
            });
        }
        return Ok(());
    }
    let _ = ORT_RUNTIME_PATH.set(runtime_library_path.to_path_buf());
    ort::init_from(runtime_library_path.to_string_lossy().to_string())
        .map_err(|err| EmbedderError::ProviderFailure {
            message: format!("initialize ONNX Runtime failed: {err}"),
        })?
        .with_name("retrieval-sidecar")
        .commit();
    Ok(())
}

fn require_existing(path: &Path, description: &str) -> Result<PathBuf, EmbedderError> {
    std::fs::metadata(path).map_err(|_| EmbedderError::InvalidConfiguration {
        message: format!("{description} `{}` does not exist", path.display()),
    })?;
    Ok(path.to_path_buf())
}

impl OnnxLocalEmbedder {
    pub fn new(config: OnnxLocalConfig) -> Result<Self, EmbedderError> {
        if config.dimension == 0 {
            return Err(EmbedderError::InvalidConfiguration {
                message: "dimension must be greater than zero".into(),
            });
        }
        if config.max_input_length == 0 {
            return Err(EmbedderError::InvalidConfiguration {
                message: "max_input_length must be greater than zero".into(),
            });
        }

        let runtime = require_existing(&config.runtime_library_path, "ONNX Runtime shared library")?;
        ensure_ort_initialized(&runtime)?;
        let model_path = require_existing(&config.model_path, "ONNX model")?;
        let tokenizer_path = require_existing(&config.tokenizer_path, "tokenizer config")?;

        let session = Session::builder()
            .map_err(|err| EmbedderError::ProviderFailure {
                message: format!("create session builder failed: {err}"),
            })?
            .commit_from_file(&model_path)
            .map_err(|err| EmbedderError::ProviderFailure {
                message: format!("load ONNX model failed: {err}"),
            })?;

        let tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|err| EmbedderError::ProviderFailure {
                message: format!("load tokenizer failed: {err}"),
            })?;
        let pad_id = tokenizer
            .token_to_id("<pad>")
            .or_else(|| tokenizer.token_to_id("[PAD]"))
            .ok_or_else(|| EmbedderError::InvalidConfiguration {
                message: format!(
                    "tokenizer `{}` declares no padding token",
                    tokenizer_path.display()
                ),
            })? as i64;

        Ok(Self {
            info: EmbedderInfo {
                provider: ProviderKind::OnnxLocal,
                model_id: config.model_id,
                dimension: config.dimension,
            },
            session: Mutex::new(session),
            tokenizer: Arc::new(tokenizer),
            pad_id,
            max_input_length: config.max_input_length,
        })
    }

    fn run_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let encodings = texts
            .iter()
            .map(|t| self.tokenizer.encode(*t, true))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| EmbedderError::ProviderFailure {
                message: format!("tokenize inputs failed: {err}"),
            })?;

        let seq_len = encodings.iter().map(|e| e.len()).max().unwrap_or(0);
        if seq_len > self.max_input_length {
            return Err(EmbedderError::InputTooLong {
                max_length: self.max_input_length,
                actual_length: seq_len,
            });
        }

        let batch = encodings.len();
        let mut input_ids = Array2::<i64>::zeros((batch, seq_len));
        let mut attention = Array2::<i64>::zeros((batch, seq_len));
        for (row, encoding) in encodings.iter().enumerate() {
            for (col, (&id, &mask)) in encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask().iter())
                .enumerate()
            {
                input_ids[(row, col)] = id as i64;
                attention[(row, col)] = mask as i64;
            }
            for col in encoding.len()..seq_len {
                input_ids[(row, col)] = self.pad_id;
            }
        }
        let attention_rows = attention.clone();

        let input_ids =
            Tensor::from_array(input_ids).map_err(|err| EmbedderError::ProviderFailure {
                message: format!("prepare input_ids failed: {err}"),
            })?;
        let attention =
            Tensor::from_array(attention).map_err(|err| EmbedderError::ProviderFailure {
                message: format!("prepare attention_mask failed: {err}"),
            })?;

        let mut session = self.session.lock().unwrap();
        let outputs = session
            .run(ort::inputs![input_ids, attention])
            .map_err(|err| EmbedderError::ProviderFailure {
                message: format!("execute ONNX session failed: {err}"),
            })?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(|err| {
            EmbedderError::ProviderFailure {
                message: format!("extract output tensor failed: {err}"),
            }
        })?;
        if shape.len() != 3 {
            return Err(EmbedderError::ProviderFailure {
                message: format!(
                    "model output must be rank-3 [batch, seq_len, hidden], got {:?}",
                    shape.iter().copied().collect::<Vec<i64>>()
                ),
            });
        }
        let hidden = shape[2] as usize;

        // Mean-pool over positions the attention mask keeps.
        let mut pooled = Vec::with_capacity(batch);
        for b in 0..batch {
            let mut sum = vec![0f32; hidden];
            let mut kept = 0f32;
            for t in 0..seq_len {
                if attention_rows[(b, t)] == 1 {
                    let base = (b * seq_len + t) * hidden;
                    for (h, slot) in sum.iter_mut().enumerate() {
                        *slot += data[base + h];
                    }
                    kept += 1.0;
                }
            }
            if kept > 0.0 {
                for slot in sum.iter_mut() {
                    *slot /= kept;
                }
            }
            if sum.len() != self.info.dimension {
                return Err(EmbedderError::ProviderFailure {
                    message: format!(
                        "pooled dimension {} does not match configured dimension {}",
                        sum.len(),
                        self.info.dimension
                    ),
                });
            }
            pooled.push(sum);
        }
        Ok(pooled)
    }
}

impl Embedder for OnnxLocalEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut vectors = self.run_batch(&[text])?;
        vectors
            .pop()
            .ok_or_else(|| EmbedderError::ProviderFailure {
                message: "missing pooled output".into(),
            })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run_batch(texts)
    }

    fn info(&self) -> &EmbedderInfo {
        &self.info
    }
}

/// Configuration for the deterministic hash embedder.
#[derive(Debug, Clone)]
pub struct HashEmbedderConfig {
    pub dimension: usize,
    pub max_input_length: usize,
    pub model_id: String,
}

/// Deterministic pseudo embedder: each component is a hash of
/// `(seed, component index, text)` mapped into `[-1, 1]`.
///
/// Useful for offline runs and tests; the same text always embeds to the
/// same vector for a given model id.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    info: EmbedderInfo,
    max_input_length: usize,
    base_seed: u64,
}

impl HashEmbedder {
    pub fn new(config: HashEmbedderConfig) -> Result<Self, EmbedderError> {
        if config.dimension == 0 {
            return Err(EmbedderError::InvalidConfiguration {
                message: "dimension must be greater than zero".into(),
            });
        }
        if config.max_input_length == 0 {
            return Err(EmbedderError::InvalidConfiguration {
                message: "max_input_length must be greater than zero".into(),
            });
        }
        let mut hasher = DefaultHasher::new();
        ProviderKind::SeededHash.hash(&mut hasher);
        config.model_id.hash(&mut hasher);
        let base_seed = hasher.finish();
        Ok(Self {
            info: EmbedderInfo {
                provider: ProviderKind::SeededHash,
                model_id: config.model_id,
                dimension: config.dimension,
            },
            max_input_length: config.max_input_length,
            base_seed,
        })
    }

    fn component(&self, index: usize, text: &str) -> f32 {
        let mut hasher = DefaultHasher::new();
        self.base_seed.hash(&mut hasher);
        index.hash(&mut hasher);
        text.hash(&mut hasher);
        let normalized = (hasher.finish() as f64) / (u64::MAX as f64);
        (normalized * 2.0 - 1.0) as f32
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let actual_length = text.chars().count();
        if actual_length > self.max_input_length {
            return Err(EmbedderError::InputTooLong {
                max_length: self.max_input_length,
                actual_length,
            });
        }
        Ok((0..self.info.dimension)
            .map(|index| self.component(index, text))
            .collect())
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn info(&self) -> &EmbedderInfo {
        &self.info
    }
}
