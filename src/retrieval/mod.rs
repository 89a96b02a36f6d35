//! Retrieval: query embedding, similarity ranking and MMR selection

mod mmr;
mod retriever;

pub use mmr::{cosine_similarity, maximal_marginal_relevance};
pub use retriever::{RetrievalSettings, RetrievedChunk, Retriever};
