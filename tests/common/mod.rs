//! Shared fixtures for integration tests

#![allow(dead_code)]

use bookrag::embedding::{EmbeddingError, EmbeddingProvider};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DIMENSION: usize = 64;

/// Deterministic bag-of-words embedder: every lowercase word is hashed
/// into one of `DIMENSION` buckets
pub struct BagOfWords;

impl BagOfWords {
    fn bucket(word: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % DIMENSION as u64) as usize
    }
}

impl EmbeddingProvider for BagOfWords {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0; DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[Self::bucket(&word.to_lowercase())] += 1.0;
        }
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_name(&self) -> &str {
        "test/bag-of-words"
    }
}

/// Counts how many times a provider factory ran
#[derive(Clone, Default)]
pub struct FactoryCounter(Arc<AtomicUsize>);

impl FactoryCounter {
    pub fn make(&self) -> Result<BagOfWords, EmbeddingError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(BagOfWords)
    }

    pub fn calls(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Write a book of `chars` characters built from repeating `text`
pub fn write_book(dir: &Path, name: &str, text: &str, chars: usize) -> PathBuf {
    let path = dir.join(name);
    let content: String = text.chars().cycle().take(chars).collect();
    std::fs::write(&path, content).unwrap();
    path
}

/// A short story with a few distinct scenes, padded to `chars` characters
pub fn write_story(dir: &Path, chars: usize) -> PathBuf {
    let scenes = [
        "Gandalf the wizard arrives in the Shire and meets Frodo at Bag End. ",
        "The hobbits travel east toward Bree and the Prancing Pony inn. ",
        "Strider guides them through the wild to Weathertop under the moon. ",
        "Elrond holds a council in Rivendell to decide the fate of the ring. ",
        "The fellowship passes through the dark mines of Moria in silence. ",
    ];
    let mut content = String::new();
    let mut i = 0;
    while content.chars().count() < chars {
        content.push_str(scenes[(i / 4) % scenes.len()]);
        i += 1;
    }
    let content: String = content.chars().take(chars).collect();

    let path = dir.join("lord_of_the_rings.txt");
    std::fs::write(&path, content).unwrap();
    path
}

/// Numbered travel log with no repeating period short of the whole text,
/// truncated to `chars` characters
pub fn write_chronicle(dir: &Path, chars: usize) -> PathBuf {
    let names = ["Gandalf", "Frodo", "Sam", "Aragorn", "Legolas", "Gimli", "Boromir"];
    let places = [
        "Bree", "Rivendell", "Moria", "Lothlorien", "Rohan", "Gondor", "Isengard", "Mordor",
        "Hobbiton", "Weathertop", "Edoras",
    ];
    let items = [
        "a lantern", "a map", "bread", "rope", "a sword", "a letter", "pipe-weed", "a cloak",
        "an axe", "a bow", "a horn", "a ring", "a staff",
    ];

    let mut content = String::new();
    let mut i = 0;
    while content.chars().count() < chars {
        content.push_str(&format!(
            "Entry {}: {} walked to {} carrying {}. ",
            i,
            names[i % names.len()],
            places[i % places.len()],
            items[i % items.len()]
        ));
        i += 1;
    }
    let content: String = content.chars().take(chars).collect();

    let path = dir.join("chronicle.txt");
    std::fs::write(&path, content).unwrap();
    path
}

/// Every file under `dir` with its bytes, sorted by path
pub fn snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let bytes = std::fs::read(&path).unwrap();
                files.push((path, bytes));
            }
        }
    }
    files.sort();
    files
}
