//! bookrag - retrieval over a single text document
//!
//! Ingestion loads one document, splits it into overlapping character
//! windows, embeds every chunk with a local sentence-transformer model and
//! persists the result once. Retrieval embeds a query and returns the
//! chunks selected by maximal marginal relevance.

pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod retrieval;
pub mod splitter;
pub mod store;

pub use error::{RagError, Result};
