//! Query-time retrieval over a persisted store

use crate::config::{RetrievalConfig, SearchType};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::store::{ScoredEntry, VectorStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ranking parameters for one retriever
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    pub search_type: SearchType,
    /// Number of results returned
    pub k: usize,
    /// Candidate pool size for MMR
    pub fetch_k: usize,
    /// Relevance weight for MMR (0.0 = diversity, 1.0 = relevance)
    pub lambda_mult: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            search_type: SearchType::Mmr,
            k: 4,
            fetch_k: 15,
            lambda_mult: 0.3,
        }
    }
}

impl From<&RetrievalConfig> for RetrievalSettings {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            search_type: config.search_type,
            k: config.k,
            fetch_k: config.fetch_k,
            lambda_mult: config.lambda_mult,
        }
    }
}

/// A retrieved chunk with its source metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: Value,
    /// Cosine similarity to the query
    pub score: f32,
}

impl RetrievedChunk {
    /// The `source` metadata field, if present
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

impl From<ScoredEntry<'_>> for RetrievedChunk {
    fn from(hit: ScoredEntry<'_>) -> Self {
        Self {
            text: hit.entry.text.clone(),
            metadata: hit.entry.metadata.clone(),
            score: hit.score,
        }
    }
}

/// Embeds queries and ranks stored chunks against them
///
/// Owns its store and provider; nothing is shared through globals, so any
/// number of retrievers can live side by side.
pub struct Retriever<S, P> {
    store: S,
    provider: P,
    settings: RetrievalSettings,
}

impl<S: VectorStore, P: EmbeddingProvider> Retriever<S, P> {
    pub fn new(store: S, provider: P, settings: RetrievalSettings) -> Self {
        if let Some(stored) = store.embedding_model() {
            if stored != provider.model_name() {
                tracing::warn!(
                    "Store was built with '{}' but queries will be embedded with '{}'",
                    stored,
                    provider.model_name()
                );
            }
        }

        Self {
            store,
            provider,
            settings,
        }
    }

    /// Return up to `k` chunks for `query`, in ranking order
    pub fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        if self.store.is_empty() {
            tracing::info!("Store is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        let query_vector = self.provider.embed(query)?;
        let RetrievalSettings {
            search_type,
            k,
            fetch_k,
            lambda_mult,
        } = self.settings;

        let hits = match search_type {
            SearchType::Mmr => self.store.max_marginal_relevance_search_by_vector(
                &query_vector,
                k,
                fetch_k,
                lambda_mult,
            )?,
            SearchType::Similarity => self.store.similarity_search_by_vector(&query_vector, k)?,
        };

        tracing::info!(
            "Retrieved {} chunks ({:?}, k={}, fetch_k={}, lambda={})",
            hits.len(),
            search_type,
            k,
            fetch_k,
            lambda_mult
        );

        Ok(hits.into_iter().map(RetrievedChunk::from).collect())
    }
}
