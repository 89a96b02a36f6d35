//! One-shot ingestion: load, split, embed and persist a document
//!
//! Ingestion is idempotent on the store directory alone. If the directory
//! exists the run is a no-op, regardless of what the source now contains.

use crate::config::{Config, IndexConfig, SplitterConfig};
use crate::document::{hash_content, load_text};
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::splitter::CharacterSplitter;
use crate::store::{CollectionInfo, NewEntry, PersistentStore};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Collection name written into every store
pub const COLLECTION_NAME: &str = "bookrag";

/// Settings consumed by [`Ingestor`]
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub splitter: SplitterConfig,
    pub batch_size: usize,
    pub index: IndexConfig,
    pub collection_name: String,
}

impl From<&Config> for IngestSettings {
    fn from(config: &Config) -> Self {
        Self {
            splitter: config.splitter.clone(),
            batch_size: config.embedding.batch_size,
            index: config.index.clone(),
            collection_name: COLLECTION_NAME.to_string(),
        }
    }
}

/// Summary of a store that was just built
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub store_dir: PathBuf,
    pub chunks: usize,
    pub dimension: usize,
    pub model: String,
    pub disk_bytes: u64,
    pub duration_ms: u64,
}

/// Result of an ingestion run
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// The store directory was already there; nothing was touched.
    /// `source_changed` is `None` when the comparison could not be made.
    AlreadyExists {
        store_dir: PathBuf,
        source_changed: Option<bool>,
    },
    Created(IngestReport),
}

pub struct Ingestor {
    settings: IngestSettings,
}

impl Ingestor {
    pub fn new(settings: IngestSettings) -> Self {
        Self { settings }
    }

    /// Build the store at `store_dir` from `source` unless it already exists
    ///
    /// `make_provider` is only called once the run is known to need
    /// embeddings, so an existing store never loads a model.
    pub fn run<F, P>(&self, source: &Path, store_dir: &Path, make_provider: F) -> Result<IngestOutcome>
    where
        F: FnOnce() -> std::result::Result<P, EmbeddingError>,
        P: EmbeddingProvider,
    {
        if store_dir.exists() {
            let source_changed = self.source_changed(source, store_dir);
            if source_changed == Some(true) {
                tracing::warn!(
                    "{} changed since {} was built; delete the store to re-ingest",
                    source.display(),
                    store_dir.display()
                );
            }
            tracing::info!("Vector store already exists at {}", store_dir.display());
            return Ok(IngestOutcome::AlreadyExists {
                store_dir: store_dir.to_path_buf(),
                source_changed,
            });
        }

        if !source.exists() {
            return Err(RagError::DocumentNotFound {
                path: source.to_path_buf(),
            });
        }

        let started = Instant::now();
        tracing::info!(
            "Store {} does not exist, initializing from {}",
            store_dir.display(),
            source.display()
        );

        let splitter = CharacterSplitter::from_config(&self.settings.splitter)?;
        let document = load_text(source)?;
        let source_hash = document.content_hash();
        let chunks = splitter.split(&document);
        tracing::info!(
            "Split {} characters into {} chunks (size {}, overlap {})",
            document.char_len(),
            chunks.len(),
            splitter.chunk_size(),
            splitter.chunk_overlap()
        );

        let provider = make_provider()?;
        tracing::info!("Creating embeddings with {}", provider.model_name());

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embed_all(&provider, &texts)?;

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let metadata = serde_json::to_value(&chunk.metadata).map_err(|e| RagError::Json {
                    source: e,
                    context: "Failed to serialize chunk metadata".to_string(),
                })?;
                Ok(NewEntry {
                    text: chunk.text,
                    metadata,
                    embedding,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let chunk_count = entries.len();

        let collection = CollectionInfo {
            name: self.settings.collection_name.clone(),
            embedding_model: provider.model_name().to_string(),
            dimension: provider.dimension(),
            source_hash: Some(source_hash),
            created_at: Utc::now(),
        };
        let store = PersistentStore::create(store_dir, collection, entries, &self.settings.index)?;

        let report = IngestReport {
            store_dir: store_dir.to_path_buf(),
            chunks: chunk_count,
            dimension: provider.dimension(),
            model: provider.model_name().to_string(),
            disk_bytes: store.disk_size()?,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Created store with {} chunks in {} ms",
            report.chunks,
            report.duration_ms
        );

        Ok(IngestOutcome::Created(report))
    }

    /// Embed in batches, checking every vector against the provider's dimension
    fn embed_all<P: EmbeddingProvider>(&self, provider: &P, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.settings.batch_size.max(1);
        let mut embeddings = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(batch_size).enumerate() {
            let vectors = provider.embed_batch(batch)?;
            if vectors.len() != batch.len() {
                return Err(EmbeddingError::GenerationError(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                ))
                .into());
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != provider.dimension()) {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: provider.dimension(),
                    actual: bad.len(),
                }
                .into());
            }

            tracing::debug!("Embedded batch {} ({} chunks)", i + 1, batch.len());
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    /// Compare the source's hash with the one recorded in the store
    fn source_changed(&self, source: &Path, store_dir: &Path) -> Option<bool> {
        let recorded = PersistentStore::read_collection_info(store_dir)
            .ok()?
            .source_hash?;
        let bytes = std::fs::read(source).ok()?;
        Some(hash_content(&bytes) != recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Embeds a text by its length and vowel count
    struct ShapeProvider;

    impl EmbeddingProvider for ShapeProvider {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
            Ok(vec![text.len() as f32 + 1.0, vowels as f32, 1.0])
        }

        fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "shape"
        }
    }

    /// Returns one vector too few
    struct ShortProvider;

    impl EmbeddingProvider for ShortProvider {
        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0])
        }

        fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(vec![vec![1.0]; texts.len().saturating_sub(1)])
        }

        fn dimension(&self) -> usize {
            1
        }

        fn model_name(&self) -> &str {
            "short"
        }
    }

    fn ingestor(batch_size: usize) -> Ingestor {
        let mut settings = IngestSettings::from(&Config::default());
        settings.batch_size = batch_size;
        Ingestor::new(settings)
    }

    fn write_source(temp: &TempDir, chars: usize) -> PathBuf {
        let path = temp.path().join("book.txt");
        let text: String = "the road goes ever on ".chars().cycle().take(chars).collect();
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_creates_store() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, 2500);
        let store_dir = temp.path().join("db");

        let outcome = ingestor(2).run(&source, &store_dir, || Ok(ShapeProvider)).unwrap();
        let IngestOutcome::Created(report) = outcome else {
            panic!("expected a new store");
        };
        assert_eq!(report.chunks, 3);
        assert_eq!(report.dimension, 3);
        assert_eq!(report.model, "shape");

        let store = PersistentStore::open(&store_dir, &IndexConfig::default()).unwrap();
        assert_eq!(store.entries().len(), 3);
        assert_eq!(store.collection().name, COLLECTION_NAME);
        assert_eq!(
            store.entries()[1].metadata["source"],
            source.display().to_string()
        );
    }

    #[test]
    fn test_existing_store_skips_provider() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, 1200);
        let store_dir = temp.path().join("db");
        let ingestor = ingestor(32);

        ingestor.run(&source, &store_dir, || Ok(ShapeProvider)).unwrap();

        let calls = AtomicUsize::new(0);
        let outcome = ingestor
            .run(&source, &store_dir, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(ShapeProvider)
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            outcome,
            IngestOutcome::AlreadyExists {
                source_changed: Some(false),
                ..
            }
        ));
    }

    #[test]
    fn test_changed_source_is_reported_not_rebuilt() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, 1200);
        let store_dir = temp.path().join("db");
        let ingestor = ingestor(32);

        ingestor.run(&source, &store_dir, || Ok(ShapeProvider)).unwrap();
        std::fs::write(&source, "a different book entirely").unwrap();

        let outcome = ingestor.run(&source, &store_dir, || Ok(ShapeProvider)).unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::AlreadyExists {
                source_changed: Some(true),
                ..
            }
        ));

        let store = PersistentStore::open(&store_dir, &IndexConfig::default()).unwrap();
        assert_eq!(store.entries().len(), 2);
    }

    #[test]
    fn test_missing_source_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let store_dir = temp.path().join("db");

        let result = ingestor(32).run(&temp.path().join("missing.txt"), &store_dir, || {
            Ok(ShapeProvider)
        });

        assert!(matches!(result, Err(RagError::DocumentNotFound { .. })));
        assert!(!store_dir.exists());
    }

    #[test]
    fn test_provider_failure_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, 1200);
        let store_dir = temp.path().join("db");

        let result = ingestor(32).run(&source, &store_dir, || {
            Err::<ShapeProvider, _>(EmbeddingError::InitializationError("offline".to_string()))
        });

        assert!(matches!(result, Err(RagError::Embedding(_))));
        assert!(!store_dir.exists());
    }

    #[test]
    fn test_short_batch_is_an_error() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, 1200);
        let store_dir = temp.path().join("db");

        let result = ingestor(32).run(&source, &store_dir, || Ok(ShortProvider));
        assert!(matches!(result, Err(RagError::Embedding(_))));
        assert!(!store_dir.exists());
    }
}
