//! Embedding providers and vector utilities.
//!
//! Defines the [`Embedder`] trait and two implementations:
//! - **[`LocalEmbedder`]** runs a sentence-transformer model in-process via
//!   fastembed. The model is loaded once; after the first download no
//!   network access is needed.
//! - **[`HashingEmbedder`]** produces feature-hashed bag-of-words vectors.
//!   It needs no model files, which makes it suitable for offline use and
//!   tests.
//!
//! Both are deterministic: the same text always yields the same vector.
//!
//! # Provider Selection
//!
//! ```rust
//! # use resume_advisor::config::EmbeddingConfig;
//! # use resume_advisor::embedding::create_embedder;
//! let config = EmbeddingConfig {
//!     provider: "hashing".to_string(),
//!     ..EmbeddingConfig::default()
//! };
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.dims(), 384);
//! ```

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::error::{AdvisorError, Result};

/// A text-to-vector model.
///
/// `embed` is synchronous and CPU-bound; async callers should run it on
/// `tokio::task::spawn_blocking`.
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Length of every vector this embedder returns.
    fn dims(&self) -> usize;
    /// Embed a batch. The output is parallel to `texts`.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    embedder
        .embed(&[text.to_string()])?
        .into_iter()
        .next()
        .ok_or_else(|| AdvisorError::Embedding("empty embedding response".to_string()))
}

/// Instantiate the provider named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"local"` | [`LocalEmbedder`] (requires the `local-embeddings` feature) |
/// | `"hashing"` | [`HashingEmbedder`] |
///
/// # Errors
///
/// Unknown provider names, or a local model that cannot be loaded.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dims))),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(AdvisorError::Embedding(
            "local embedding provider requires --features local-embeddings".to_string(),
        )),
        other => Err(AdvisorError::Config(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Local Provider (fastembed) ============

/// Sentence-transformer inference via fastembed with bundled ONNX Runtime.
///
/// Weights are fetched from Hugging Face on first use and cached. Failure
/// to load them is fatal for this embedder.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: std::sync::Mutex<fastembed::TextEmbedding>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let fastembed_model = config_to_fastembed_model(&config.model)?;
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(false),
        )
        .map_err(|e| {
            AdvisorError::Embedding(format!(
                "failed to load local embedding model '{}': {}",
                config.model, e
            ))
        })?;

        tracing::info!(model = %config.model, "local embedding model loaded");

        Ok(Self {
            model_name: config.model.clone(),
            dims: local_model_dims(&config.model),
            batch_size: config.batch_size,
            model: std::sync::Mutex::new(model),
        })
    }
}

#[cfg(feature = "local-embeddings")]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = self
            .model
            .lock()
            .map_err(|_| AdvisorError::Internal("embedding model lock poisoned".to_string()))?;
        model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| AdvisorError::Embedding(format!("local embedding failed: {}", e)))
    }
}

#[cfg(feature = "local-embeddings")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => Err(AdvisorError::Config(format!(
            "unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, all-minilm-l12-v2, bge-small-en-v1.5, \
             bge-base-en-v1.5, nomic-embed-text-v1.5",
            other
        ))),
    }
}

#[cfg_attr(not(feature = "local-embeddings"), allow(dead_code))]
fn local_model_dims(name: &str) -> usize {
    match name {
        "bge-base-en-v1.5" | "nomic-embed-text-v1.5" => 768,
        _ => 384,
    }
}

// ============ Hashing Provider ============

/// Feature-hashing bag-of-words embedder.
///
/// Tokens are lower-cased alphanumeric runs; each is hashed with SHA-256
/// into one of `dims` buckets and the term-frequency vector is
/// L2-normalised. Text with no tokens maps to the zero vector.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut tf = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            tf[self.bucket(&token.to_lowercase())] += 1.0;
        }

        let norm: f32 = tf.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut tf {
                *x /= norm;
            }
        }
        tf
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(head) % self.dims as u64) as usize
    }
}

impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, and zero vectors.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
