/// Embedding & Indexing
///
/// Local embedding generation and nearest-neighbor indexing:
/// - EmbeddingProvider trait for abstraction
/// - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
/// - HNSW for vector similarity search
mod provider;
mod vector_index;

pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider, DEFAULT_MODEL};
pub use vector_index::{SearchResult, VectorIndex, VectorIndexError};
