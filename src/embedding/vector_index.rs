/// HNSW vector index for similarity search
use hnsw_rs::prelude::*;
use thiserror::Error;

/// hnsw_rs caps the layer count at 16 internally
const MAX_LAYERS: usize = 16;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

/// Search result with position and similarity score
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Position of the vector in insertion order
    pub id: usize,
    /// Cosine similarity score (higher is more similar)
    pub score: f32,
}

/// HNSW vector index wrapper
///
/// Provides approximate nearest neighbor search over cosine distance.
/// Built in memory from persisted vectors each time a store is opened.
pub struct VectorIndex {
    index: Hnsw<'static, f32, DistCosine>,
    dimension: usize,
    ef_search: usize,
    count: usize,
}

impl VectorIndex {
    /// Create a new vector index
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `capacity` - Expected number of vectors
    /// * `m` - HNSW M parameter (number of connections per layer)
    /// * `ef_construction` - HNSW construction parameter (higher = better recall, slower build)
    /// * `ef_search` - HNSW search parameter (higher = better recall, slower search)
    pub fn new(
        dimension: usize,
        capacity: usize,
        m: usize,
        ef_construction: usize,
        ef_search: usize,
    ) -> Result<Self, VectorIndexError> {
        if dimension == 0 || m == 0 || ef_construction == 0 {
            return Err(VectorIndexError::InitializationError(format!(
                "dimension ({}), m ({}) and ef_construction ({}) must be positive",
                dimension, m, ef_construction
            )));
        }

        let index = Hnsw::<f32, DistCosine>::new(
            m,
            capacity.max(1),
            MAX_LAYERS,
            ef_construction,
            DistCosine,
        );

        Ok(Self {
            index,
            dimension,
            ef_search,
            count: 0,
        })
    }

    /// Insert a vector into the index
    pub fn insert(&mut self, id: usize, vector: &[f32]) -> Result<(), VectorIndexError> {
        self.check_dimension(vector)?;

        let data = vector.to_vec();
        self.index.insert((&data, id));
        self.count += 1;

        Ok(())
    }

    /// Search for k nearest neighbors
    ///
    /// # Returns
    /// Vector of (id, similarity_score) pairs, sorted by score descending
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, VectorIndexError> {
        self.check_dimension(query)?;

        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let ef = self.ef_search.max(k);
        let mut results: Vec<SearchResult> = self
            .index
            .search(query, k, ef)
            .into_iter()
            .map(|neighbor| SearchResult {
                id: neighbor.d_id,
                score: 1.0 - neighbor.distance,
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));

        Ok(results)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}
