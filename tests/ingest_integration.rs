//! Ingestion pipeline against a real on-disk store

mod common;

use bookrag::config::{Config, IndexConfig};
use bookrag::ingest::{IngestOutcome, IngestSettings, Ingestor};
use bookrag::store::{PersistentStore, DATABASE_FILE};
use bookrag::RagError;
use common::{snapshot, write_book, BagOfWords, FactoryCounter};
use tempfile::TempDir;

fn default_ingestor() -> Ingestor {
    Ingestor::new(IngestSettings::from(&Config::default()))
}

#[test]
fn test_first_run_builds_store() {
    let temp = TempDir::new().unwrap();
    let source = write_book(temp.path(), "book.txt", "Far over the misty mountains cold. ", 5000);
    let store_dir = temp.path().join("db").join("chroma_db");

    let outcome = default_ingestor()
        .run(&source, &store_dir, || Ok(BagOfWords))
        .unwrap();

    let IngestOutcome::Created(report) = outcome else {
        panic!("expected a new store");
    };
    assert_eq!(report.chunks, 6);
    assert_eq!(report.dimension, common::DIMENSION);
    assert!(store_dir.join(DATABASE_FILE).exists());

    println!("✓ Store created with {} chunks", report.chunks);
}

#[test]
fn test_window_chunks_cover_document() {
    let temp = TempDir::new().unwrap();
    let source = write_book(temp.path(), "book.txt", "abcdefghij", 5000);
    let store_dir = temp.path().join("db");

    default_ingestor()
        .run(&source, &store_dir, || Ok(BagOfWords))
        .unwrap();

    let store = PersistentStore::open(&store_dir, &IndexConfig::default()).unwrap();
    let entries = store.entries();
    assert_eq!(entries.len(), 6);

    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.metadata["chunk_index"], i);
        assert_eq!(entry.metadata["start_offset"], i * 950);
        assert!(entry.text.chars().count() <= 1000);
    }
    assert_eq!(entries[5].text.chars().count(), 250);

    // Consecutive windows share exactly the overlap
    let first: Vec<char> = entries[0].text.chars().collect();
    let second: Vec<char> = entries[1].text.chars().collect();
    assert_eq!(first[950..], second[..50]);
}

#[test]
fn test_second_run_is_a_no_op() {
    let temp = TempDir::new().unwrap();
    let source = write_book(temp.path(), "book.txt", "Not all those who wander are lost. ", 3000);
    let store_dir = temp.path().join("db");
    let ingestor = default_ingestor();

    let first = FactoryCounter::default();
    ingestor
        .run(&source, &store_dir, || first.make())
        .unwrap();
    assert_eq!(first.calls(), 1);

    let before = snapshot(&store_dir);

    let second = FactoryCounter::default();
    let outcome = ingestor
        .run(&source, &store_dir, || second.make())
        .unwrap();

    assert_eq!(second.calls(), 0, "existing store must not load a model");
    assert!(matches!(outcome, IngestOutcome::AlreadyExists { .. }));
    assert_eq!(before, snapshot(&store_dir), "store must be untouched");
}

#[test]
fn test_existing_empty_directory_counts_as_store() {
    let temp = TempDir::new().unwrap();
    let source = write_book(temp.path(), "book.txt", "one ring ", 2000);
    let store_dir = temp.path().join("db");
    std::fs::create_dir_all(&store_dir).unwrap();

    let counter = FactoryCounter::default();
    let outcome = default_ingestor()
        .run(&source, &store_dir, || counter.make())
        .unwrap();

    assert_eq!(counter.calls(), 0);
    assert!(matches!(
        outcome,
        IngestOutcome::AlreadyExists {
            source_changed: None,
            ..
        }
    ));
}

#[test]
fn test_missing_source_names_path() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("documents").join("lord_of_the_rings.txt");
    let store_dir = temp.path().join("db");

    let counter = FactoryCounter::default();
    let err = default_ingestor()
        .run(&source, &store_dir, || counter.make())
        .unwrap_err();

    assert!(matches!(err, RagError::DocumentNotFound { .. }));
    assert!(err.to_string().contains("lord_of_the_rings.txt"));
    assert!(err.to_string().contains("does not exist"));
    assert_eq!(counter.calls(), 0);
    assert!(!store_dir.exists());
}

#[test]
fn test_empty_document_creates_empty_store() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("empty.txt");
    std::fs::write(&source, "").unwrap();
    let store_dir = temp.path().join("db");

    let outcome = default_ingestor()
        .run(&source, &store_dir, || Ok(BagOfWords))
        .unwrap();

    let IngestOutcome::Created(report) = outcome else {
        panic!("expected a new store");
    };
    assert_eq!(report.chunks, 0);

    let store = PersistentStore::open(&store_dir, &IndexConfig::default()).unwrap();
    assert!(store.entries().is_empty());
}

#[test]
fn test_separator_mode_from_config() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("book.txt");
    let paragraphs: Vec<String> = (0..30)
        .map(|i| format!("Paragraph {} of the tale, where the road goes ever on.", i))
        .collect();
    std::fs::write(&source, paragraphs.join("\n\n")).unwrap();
    let store_dir = temp.path().join("db");

    let mut config = Config::default();
    config.splitter.chunk_size = 200;
    config.splitter.chunk_overlap = 0;
    config.splitter.separator = Some("\n\n".to_string());

    Ingestor::new(IngestSettings::from(&config))
        .run(&source, &store_dir, || Ok(BagOfWords))
        .unwrap();

    let store = PersistentStore::open(&store_dir, &IndexConfig::default()).unwrap();
    assert!(store.entries().len() > 1);
    for entry in store.entries() {
        assert!(entry.text.chars().count() <= 200);
        assert!(entry.text.starts_with("Paragraph"));
    }
}
