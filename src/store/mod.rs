//! Persistent vector store
//!
//! A store is a directory holding one SQLite collection. Entries are written
//! once at ingestion time; readers open the database read-only and rebuild
//! the neighbor index in memory.

pub mod database;
mod persistent;

pub use database::{Database, DbPool};
pub use persistent::{CollectionInfo, NewEntry, PersistentStore, DATABASE_FILE};

use crate::embedding::SearchResult;
use crate::error::Result;
use crate::retrieval::maximal_marginal_relevance;
use serde_json::Value;
use uuid::Uuid;

/// One persisted (text, metadata, embedding) entry
#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub id: Uuid,
    pub text: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

/// An entry returned from a search, with its similarity to the query
#[derive(Debug, Clone, Copy)]
pub struct ScoredEntry<'a> {
    pub entry: &'a StoreEntry,
    pub score: f32,
}

/// Read-side contract of a vector store
///
/// Implementors provide nearest-neighbor lookup; similarity and MMR search
/// are built on top of it.
pub trait VectorStore {
    /// Number of stored entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry at a position returned by [`VectorStore::nearest`]
    fn entry(&self, position: usize) -> Option<&StoreEntry>;

    /// Model the stored vectors were produced with, if recorded
    fn embedding_model(&self) -> Option<&str>;

    /// Up to `k` nearest entries to `query`, most similar first
    fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Top `k` entries by similarity
    fn similarity_search_by_vector(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry<'_>>> {
        Ok(self
            .nearest(query, k)?
            .into_iter()
            .filter_map(|hit| {
                self.entry(hit.id).map(|entry| ScoredEntry {
                    entry,
                    score: hit.score,
                })
            })
            .collect())
    }

    /// Fetch `fetch_k` nearest candidates, then pick `k` of them by
    /// maximal marginal relevance. Results are in selection order.
    fn max_marginal_relevance_search_by_vector(
        &self,
        query: &[f32],
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
    ) -> Result<Vec<ScoredEntry<'_>>> {
        let candidates = self.similarity_search_by_vector(query, fetch_k.max(k))?;

        let embeddings: Vec<&[f32]> = candidates
            .iter()
            .map(|c| c.entry.embedding.as_slice())
            .collect();
        let picks = maximal_marginal_relevance(query, &embeddings, k, lambda_mult)?;

        tracing::debug!(
            "MMR selected {} of {} candidates (lambda {})",
            picks.len(),
            candidates.len(),
            lambda_mult
        );

        Ok(picks.into_iter().map(|i| candidates[i]).collect())
    }
}
