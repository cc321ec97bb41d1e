use ndarray::Array1;
use thiserror::Error;

use crate::chunker::Chunk;
use crate::embedder::{EmbeddingError, TextEncoder};

/// Default number of nearest chunks returned per question.
pub const DEFAULT_TOP_K: usize = 3;
/// Default squared-L2 gate; nearest distances above this mark a question as
/// off-topic for the indexed content. Calibrated against the 384-dimension
/// `all-minilm`-class embedding space.
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 1.5;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("encoder returned {got} vectors for {expected} chunks")]
    CountMismatch { expected: usize, got: usize },
    #[error("embedding dimension mismatch: index holds {expected}, encoder produced {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("cannot build an index over an empty chunk sequence")]
    EmptyIndex,
}

/// One search hit: a chunk position and its squared Euclidean distance from
/// the query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMatch {
    pub chunk_index: usize,
    pub distance: f32,
}

/// Up to `k` matches sorted by ascending distance, nearest first.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub matches: Vec<ChunkMatch>,
    pub min_distance: f32,
}

impl QueryResult {
    /// Relevance gate: a question whose nearest chunk sits beyond the
    /// threshold is off-topic, and the caller must answer with a fixed
    /// refusal rather than hand irrelevant context to the generator.
    pub fn is_relevant(&self, threshold: f32) -> bool {
        self.min_distance <= threshold
    }
}

/// Flat in-memory vector index over one document's chunks.
///
/// Chunks and vectors are parallel sequences (`chunks[i]` embeds to
/// `vectors[i]`) and the dimensionality is fixed by the first embedding
/// batch. A store is either fully built or does not exist; build failures
/// never leave a partial index behind.
#[derive(Debug)]
pub struct VectorStore {
    chunks: Vec<Chunk>,
    vectors: Vec<Array1<f32>>,
    dimension: usize,
}

impl VectorStore {
    /// Embeds every chunk in one batch and builds the index.
    pub fn build(chunks: Vec<Chunk>, encoder: &dyn TextEncoder) -> Result<Self, VectorStoreError> {
        if chunks.is_empty() {
            return Err(VectorStoreError::EmptyIndex);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = encoder.encode(&texts)?;

        if vectors.len() != chunks.len() {
            return Err(VectorStoreError::CountMismatch {
                expected: chunks.len(),
                got: vectors.len(),
            });
        }

        let dimension = vectors[0].len();
        for v in &vectors[1..] {
            if v.len() != dimension {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: dimension,
                    got: v.len(),
                });
            }
        }

        tracing::info!(chunks = chunks.len(), dimension, "built vector index");

        Ok(VectorStore {
            chunks,
            vectors,
            dimension,
        })
    }

    /// Exhaustive k-nearest-neighbor search by squared Euclidean distance.
    ///
    /// Returns the `k` nearest chunks (all of them when the index holds
    /// fewer than `k`), ties broken by ascending chunk index.
    pub fn search(
        &self,
        question: &str,
        k: usize,
        encoder: &dyn TextEncoder,
    ) -> Result<QueryResult, VectorStoreError> {
        let query = encoder
            .encode(&[question.to_string()])?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::NoVectors)?;

        if query.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }

        let mut matches: Vec<ChunkMatch> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(chunk_index, vector)| {
                let diff = vector - &query;
                ChunkMatch {
                    chunk_index,
                    distance: diff.dot(&diff),
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });

        // The global minimum, taken before truncation so it stays valid for
        // any k, including zero.
        let min_distance = matches[0].distance;
        matches.truncate(k);
        tracing::debug!(min_distance, hits = matches.len(), "search complete");

        Ok(QueryResult {
            matches,
            min_distance,
        })
    }

    pub fn chunk_text(&self, index: usize) -> Option<&str> {
        self.chunks.get(index).map(|c| c.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encodes each text to `[len/1000, 0, 0]`; deterministic and cheap, so
    /// distances are fully predictable from text lengths.
    struct StubEncoder;

    impl TextEncoder for StubEncoder {
        fn encode(&self, texts: &[String]) -> Result<Vec<Array1<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Err(EmbeddingError::EmptyBatch);
            }
            Ok(texts
                .iter()
                .map(|t| Array1::from(vec![t.len() as f32 / 1000.0, 0.0, 0.0]))
                .collect())
        }
    }

    /// Returns vectors whose dimension depends on text length; used to force
    /// dimension mismatches.
    struct RaggedEncoder;

    impl TextEncoder for RaggedEncoder {
        fn encode(&self, texts: &[String]) -> Result<Vec<Array1<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|t| Array1::from(vec![0.0; if t.len() > 5 { 3 } else { 2 }]))
                .collect())
        }
    }

    fn chunks_of<S: AsRef<str>>(texts: &[S]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(index, t)| Chunk {
                text: t.as_ref().to_string(),
                index,
            })
            .collect()
    }

    #[test]
    fn build_keeps_chunks_and_vectors_parallel() {
        let store = VectorStore::build(chunks_of(&["alpha", "beta text", "gamma"]), &StubEncoder)
            .unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.vectors.len(), store.chunks.len());
        assert_eq!(store.dimension(), 3);
    }

    #[test]
    fn build_rejects_empty_chunk_sequence() {
        let err = VectorStore::build(vec![], &StubEncoder).unwrap_err();
        assert!(matches!(err, VectorStoreError::EmptyIndex));
    }

    #[test]
    fn build_rejects_inconsistent_dimensions() {
        let err =
            VectorStore::build(chunks_of(&["tiny", "much longer text"]), &RaggedEncoder)
                .unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
    }

    #[test]
    fn build_is_deterministic() {
        let a = VectorStore::build(chunks_of(&["one", "two two"]), &StubEncoder).unwrap();
        let b = VectorStore::build(chunks_of(&["one", "two two"]), &StubEncoder).unwrap();
        assert_eq!(a.vectors, b.vectors);
        assert_eq!(a.chunks, b.chunks);
    }

    #[test]
    fn search_orders_matches_by_ascending_distance() {
        // Stub vectors: [0.1, ...], [0.25, ...], [0.5, ...]; a 260-char
        // question encodes to [0.26, ...], nearest chunk 1, then 0, then 2.
        let store = VectorStore::build(
            chunks_of(&[
                &"a".repeat(100),
                &"b".repeat(250),
                &"c".repeat(500),
            ]),
            &StubEncoder,
        )
        .unwrap();

        let result = store.search(&"q".repeat(260), 3, &StubEncoder).unwrap();
        let order: Vec<usize> = result.matches.iter().map(|m| m.chunk_index).collect();
        assert_eq!(order, vec![1, 0, 2]);
        for pair in result.matches.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        assert_eq!(result.min_distance, result.matches[0].distance);
    }

    #[test]
    fn equal_distances_break_ties_by_chunk_index() {
        // Both chunks encode to the same vector, so both distances are equal.
        let store =
            VectorStore::build(chunks_of(&[&"x".repeat(200), &"y".repeat(200)]), &StubEncoder)
                .unwrap();
        let result = store.search(&"q".repeat(300), 2, &StubEncoder).unwrap();
        let order: Vec<usize> = result.matches.iter().map(|m| m.chunk_index).collect();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn zero_k_returns_no_matches_but_reports_min_distance() {
        let store =
            VectorStore::build(chunks_of(&["first chunk", "second chunk"]), &StubEncoder).unwrap();
        let result = store.search("anything", 0, &StubEncoder).unwrap();
        assert!(result.matches.is_empty());
        assert!(result.min_distance.is_finite());
    }

    #[test]
    fn k_larger_than_index_returns_all_chunks() {
        let store = VectorStore::build(
            chunks_of(&["first chunk", "second chunk", "third chunk"]),
            &StubEncoder,
        )
        .unwrap();
        let result = store.search("anything", 10, &StubEncoder).unwrap();
        assert_eq!(result.matches.len(), 3);
    }

    #[test]
    fn query_dimension_mismatch_is_rejected() {
        let store =
            VectorStore::build(chunks_of(&["long enough text", "another long text"]), &RaggedEncoder)
                .unwrap();
        // A short question makes RaggedEncoder emit 2 components against a
        // 3-dimension index.
        let err = store.search("hi", 1, &RaggedEncoder).unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch { expected: 3, got: 2 }
        ));
    }

    #[test]
    fn relevance_gate_admits_at_most_the_threshold() {
        // Chunk vector [0.1, 0, 0]; questions of length 100 encode to the
        // same vector (distance 0) and the gate admits them; a fabricated
        // result just over the threshold is rejected.
        let store = VectorStore::build(chunks_of(&[&"a".repeat(100)]), &StubEncoder).unwrap();
        let on_topic = store.search(&"q".repeat(100), 1, &StubEncoder).unwrap();
        assert!(on_topic.is_relevant(DEFAULT_RELEVANCE_THRESHOLD));

        let exactly_at = QueryResult {
            matches: vec![],
            min_distance: DEFAULT_RELEVANCE_THRESHOLD,
        };
        assert!(exactly_at.is_relevant(DEFAULT_RELEVANCE_THRESHOLD));

        let just_over = QueryResult {
            matches: vec![],
            min_distance: DEFAULT_RELEVANCE_THRESHOLD + f32::EPSILON,
        };
        assert!(!just_over.is_relevant(DEFAULT_RELEVANCE_THRESHOLD));

        let just_under = QueryResult {
            matches: vec![],
            min_distance: DEFAULT_RELEVANCE_THRESHOLD - f32::EPSILON,
        };
        assert!(just_under.is_relevant(DEFAULT_RELEVANCE_THRESHOLD));
    }

    #[test]
    fn end_to_end_two_chunk_scenario() {
        // Spec scenario: ~500- and ~100-char chunks, question nearest to
        // chunk 0, expect [(0, d0), (1, d1)] with d0 < d1.
        let chunks = chunks_of(&[&"w".repeat(498), &"v".repeat(104)]);
        let store = VectorStore::build(chunks, &StubEncoder).unwrap();

        let result = store.search(&"q".repeat(480), 3, &StubEncoder).unwrap();
        assert_eq!(result.matches.len(), 2);
        assert_eq!(result.matches[0].chunk_index, 0);
        assert_eq!(result.matches[1].chunk_index, 1);
        assert!(result.matches[0].distance < result.matches[1].distance);
    }

    #[test]
    fn far_query_exceeds_the_gate() {
        // Stub vectors live near the origin; a query component of 2.0 puts
        // the squared distance well past 1.5.
        struct FarEncoder;
        impl TextEncoder for FarEncoder {
            fn encode(&self, texts: &[String]) -> Result<Vec<Array1<f32>>, EmbeddingError> {
                Ok(texts
                    .iter()
                    .map(|_| Array1::from(vec![2.0, 0.0, 0.0]))
                    .collect())
            }
        }

        let store =
            VectorStore::build(chunks_of(&[&"a".repeat(120), &"b".repeat(300)]), &StubEncoder)
                .unwrap();
        let result = store.search("completely unrelated", 3, &FarEncoder).unwrap();
        assert!(result.min_distance > DEFAULT_RELEVANCE_THRESHOLD);
        assert!(!result.is_relevant(DEFAULT_RELEVANCE_THRESHOLD));
    }
}
