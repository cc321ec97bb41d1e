use std::hash::{Hash, Hasher};

use lazy_static::lazy_static;
use ndarray::Array1;
use regex::Regex;
use rustc_hash::{FxHashSet, FxHasher};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("cannot embed an empty batch")]
    EmptyBatch,
    #[error("encoder returned no vectors for a non-empty batch")]
    NoVectors,
    #[error("embedding request failed: {0}")]
    Request(String),
}

/// Maps a batch of texts to fixed-length vectors, order-preserving.
///
/// Dimensionality must stay constant across calls within one session; the
/// index discovers it from the first batch and holds the encoder to it
/// afterwards.
pub trait TextEncoder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Array1<f32>>, EmbeddingError>;
}

/// Batch embedding over HTTP against an Ollama-compatible `/api/embed`
/// endpoint. The reference model is `all-minilm` (384 dimensions).
pub struct OllamaEncoder {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEncoder {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        OllamaEncoder {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }
}

impl TextEncoder for OllamaEncoder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Array1<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyBatch);
        }

        tracing::debug!(batch = texts.len(), model = %self.model, "requesting embeddings");

        let response = self
            .client
            .post(format!("{}/api/embed", self.endpoint))
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        let body: EmbedResponse = response
            .json()
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        if body.embeddings.is_empty() {
            return Err(EmbeddingError::NoVectors);
        }

        Ok(body.embeddings.into_iter().map(Array1::from).collect())
    }
}

/// Deterministic offline encoder: a signed bag-of-words feature-hashed into
/// a fixed number of buckets and L2-normalized. No model download, no
/// network; useful as a fallback and for tests, at the cost of purely
/// lexical (not semantic) similarity.
pub struct HashEncoder {
    dimension: usize,
}

impl HashEncoder {
    pub const DEFAULT_DIMENSION: usize = 384;

    pub fn new(dimension: usize) -> Self {
        HashEncoder { dimension }
    }

    fn embed_one(&self, text: &str) -> Array1<f32> {
        let mut buckets = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let mut hasher = FxHasher::default();
            token.hash(&mut hasher);
            let h = hasher.finish();

            let bucket = (h % self.dimension as u64) as usize;
            let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            buckets[bucket] += sign;
        }

        let mut vector = Array1::from(buckets);
        let norm = vector.dot(&vector).sqrt();
        if norm > 0.0 {
            vector /= norm;
        }
        vector
    }
}

impl Default for HashEncoder {
    fn default() -> Self {
        HashEncoder::new(Self::DEFAULT_DIMENSION)
    }
}

impl TextEncoder for HashEncoder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Array1<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyBatch);
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    lazy_static! {
        static ref STOP_WORDS: FxHashSet<&'static str> = {
            let words = vec![
                "a", "an", "and", "are", "as", "at", "be", "by", "for", "from",
                "has", "he", "in", "is", "it", "its", "of", "on", "that", "the",
                "to", "was", "were", "will", "with",
            ];
            words.into_iter().collect()
        };
        static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").unwrap();
    }

    let text = text.nfc().collect::<String>().to_lowercase();
    let text = NON_WORD.replace_all(&text, " ");

    text.split_whitespace()
        .filter(|token| !STOP_WORDS.contains(token))
        .map(|token| token.to_string())
        .collect()
}
