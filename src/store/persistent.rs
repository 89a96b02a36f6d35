//! Disk-backed collection: SQLite for durability, HNSW for lookup

use super::{Database, StoreEntry, VectorStore};
use crate::config::IndexConfig;
use crate::embedding::{SearchResult, VectorIndex, VectorIndexError};
use crate::error::{RagError, Result};
use crate::retrieval::cosine_similarity;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

/// Database file inside a store directory
pub const DATABASE_FILE: &str = "collection.sqlite3";

/// Description of the persisted collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub embedding_model: String,
    pub dimension: usize,
    /// BLAKE3 hash of the source document at ingestion time
    pub source_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry to be written by [`PersistentStore::create`]
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub text: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

/// Handle on a persisted collection
pub struct PersistentStore {
    dir: PathBuf,
    database: Database,
    collection: CollectionInfo,
    entries: Vec<StoreEntry>,
    index: VectorIndex,
    /// Positions of zero-norm entries, kept out of the HNSW graph
    unindexed: Vec<usize>,
    /// Collections this small are scanned exhaustively instead of via HNSW
    exact_scan_limit: usize,
}

impl PersistentStore {
    /// Create a store directory and write every entry in one transaction
    ///
    /// Fails if `dir` already exists. An interrupted write leaves the
    /// directory in an undefined state; nothing is cleaned up.
    pub fn create(
        dir: &Path,
        collection: CollectionInfo,
        entries: Vec<NewEntry>,
        index_config: &IndexConfig,
    ) -> Result<Self> {
        if dir.exists() {
            return Err(RagError::StoreExists {
                path: dir.to_path_buf(),
            });
        }

        if let Some(bad) = entries
            .iter()
            .find(|e| e.embedding.len() != collection.dimension)
        {
            return Err(VectorIndexError::InvalidDimension {
                expected: collection.dimension,
                actual: bad.embedding.len(),
            }
            .into());
        }

        std::fs::create_dir_all(dir).map_err(|e| {
            RagError::io(e, format!("Failed to create store directory: {}", dir.display()))
        })?;

        let database = Database::create(&dir.join(DATABASE_FILE))?;

        let entries: Vec<StoreEntry> = entries
            .into_iter()
            .map(|e| StoreEntry {
                id: Uuid::new_v4(),
                text: e.text,
                metadata: e.metadata,
                embedding: e.embedding,
            })
            .collect();

        {
            let mut conn = database.get_conn()?;
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO collections (name, embedding_model, dimension, source_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    collection.name,
                    collection.embedding_model,
                    collection.dimension as i64,
                    collection.source_hash,
                    collection.created_at.to_rfc3339(),
                ],
            )?;
            let collection_id = tx.last_insert_rowid();

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO entries (id, collection_id, seq, document, metadata, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for (seq, entry) in entries.iter().enumerate() {
                    let metadata =
                        serde_json::to_string(&entry.metadata).map_err(|e| RagError::Json {
                            source: e,
                            context: "Failed to serialize entry metadata".to_string(),
                        })?;
                    stmt.execute(params![
                        entry.id.to_string(),
                        collection_id,
                        seq as i64,
                        entry.text,
                        metadata,
                        encode_vector(&entry.embedding),
                    ])?;
                }
            }

            tx.commit()?;
        }

        tracing::info!(
            "Persisted {} entries to {}",
            entries.len(),
            dir.display()
        );

        Self::assemble(dir, database, collection, entries, index_config)
    }

    /// Open an existing store read-only and build its neighbor index
    ///
    /// The HNSW graph is not persisted; every open rebuilds it from the
    /// stored vectors, which costs time proportional to the collection size.
    pub fn open(dir: &Path, index_config: &IndexConfig) -> Result<Self> {
        let db_path = Self::database_path(dir)?;
        let database = Database::open_read_only(&db_path)?;

        let (collection_id, collection) = read_collection(&database, dir)?;
        let entries = read_entries(&database, dir, collection_id, collection.dimension)?;

        tracing::info!(
            "Opened collection '{}' at {} ({} entries, {}, {}D)",
            collection.name,
            dir.display(),
            entries.len(),
            collection.embedding_model,
            collection.dimension
        );

        Self::assemble(dir, database, collection, entries, index_config)
    }

    /// Read only the collection record, without loading entries
    pub fn read_collection_info(dir: &Path) -> Result<CollectionInfo> {
        let db_path = Self::database_path(dir)?;
        let database = Database::open_read_only(&db_path)?;
        read_collection(&database, dir).map(|(_, info)| info)
    }

    fn database_path(dir: &Path) -> Result<PathBuf> {
        let db_path = dir.join(DATABASE_FILE);
        if !dir.is_dir() || !db_path.is_file() {
            return Err(RagError::StoreNotFound {
                path: dir.to_path_buf(),
            });
        }
        Ok(db_path)
    }

    fn assemble(
        dir: &Path,
        database: Database,
        collection: CollectionInfo,
        entries: Vec<StoreEntry>,
        index_config: &IndexConfig,
    ) -> Result<Self> {
        let started = Instant::now();
        let mut index = VectorIndex::new(
            collection.dimension,
            entries.len(),
            index_config.hnsw_m,
            index_config.hnsw_ef_construction,
            index_config.hnsw_ef_search,
        )?;
        // Cosine distance is undefined for zero vectors; they score 0 against
        // every query and are served outside the graph.
        let mut unindexed = Vec::new();
        for (position, entry) in entries.iter().enumerate() {
            if is_zero_norm(&entry.embedding) {
                unindexed.push(position);
            } else {
                index.insert(position, &entry.embedding)?;
            }
        }

        tracing::debug!(
            "Built HNSW index over {} vectors in {} ms ({} zero-norm vectors skipped)",
            index.len(),
            started.elapsed().as_millis(),
            unindexed.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            database,
            collection,
            entries,
            index,
            unindexed,
            exact_scan_limit: index_config.exact_scan_limit,
        })
    }

    pub fn collection(&self) -> &CollectionInfo {
        &self.collection
    }

    pub fn entries(&self) -> &[StoreEntry] {
        &self.entries
    }

    pub fn is_read_only(&self) -> bool {
        self.database.is_read_only()
    }

    /// Total size of the files in the store directory
    pub fn disk_size(&self) -> Result<u64> {
        let mut size = 0u64;
        let listing = std::fs::read_dir(&self.dir).map_err(|e| {
            RagError::io(e, format!("Failed to read store directory: {}", self.dir.display()))
        })?;
        for entry in listing {
            let entry = entry
                .map_err(|e| RagError::io(e, "Failed to read store directory entry"))?;
            let metadata = entry
                .metadata()
                .map_err(|e| RagError::io(e, format!("Failed to stat {:?}", entry.path())))?;
            if metadata.is_file() {
                size += metadata.len();
            }
        }
        Ok(size)
    }

    fn exact_nearest(&self, query: &[f32], k: usize) -> Vec<SearchResult> {
        let mut hits: Vec<SearchResult> = self
            .entries
            .iter()
            .enumerate()
            .map(|(id, entry)| SearchResult {
                id,
                score: cosine_similarity(query, &entry.embedding),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(k);
        hits
    }
}

impl VectorStore for PersistentStore {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entry(&self, position: usize) -> Option<&StoreEntry> {
        self.entries.get(position)
    }

    fn embedding_model(&self) -> Option<&str> {
        Some(&self.collection.embedding_model)
    }

    fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.collection.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.collection.dimension,
                actual: query.len(),
            }
            .into());
        }

        if self.entries.len() <= self.exact_scan_limit || is_zero_norm(query) {
            return Ok(self.exact_nearest(query, k));
        }

        // Re-score with the same similarity as the exact scan
        let mut hits: Vec<SearchResult> = self
            .index
            .search(query, k)?
            .into_iter()
            .filter_map(|hit| {
                self.entries.get(hit.id).map(|entry| SearchResult {
                    id: hit.id,
                    score: cosine_similarity(query, &entry.embedding),
                })
            })
            .collect();

        if hits.len() < k {
            let missing = k - hits.len();
            hits.extend(
                self.unindexed
                    .iter()
                    .take(missing)
                    .map(|&id| SearchResult { id, score: 0.0 }),
            );
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }
}

fn is_zero_norm(vector: &[f32]) -> bool {
    vector.iter().all(|x| *x == 0.0)
}

fn read_collection(database: &Database, dir: &Path) -> Result<(i64, CollectionInfo)> {
    let conn = database.get_conn()?;

    let row = conn.query_row(
        "SELECT id, name, embedding_model, dimension, source_hash, created_at
         FROM collections ORDER BY id LIMIT 1",
        [],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        },
    );

    let (id, name, embedding_model, dimension, source_hash, created_at) = match row {
        Ok(row) => row,
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            return Err(RagError::CorruptStore {
                path: dir.to_path_buf(),
                message: "no collection recorded".to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| RagError::CorruptStore {
            path: dir.to_path_buf(),
            message: format!("bad created_at '{}': {}", created_at, e),
        })?
        .with_timezone(&Utc);

    let dimension = usize::try_from(dimension).map_err(|_| RagError::CorruptStore {
        path: dir.to_path_buf(),
        message: format!("bad dimension {}", dimension),
    })?;

    Ok((
        id,
        CollectionInfo {
            name,
            embedding_model,
            dimension,
            source_hash,
            created_at,
        },
    ))
}

fn read_entries(
    database: &Database,
    dir: &Path,
    collection_id: i64,
    dimension: usize,
) -> Result<Vec<StoreEntry>> {
    let conn = database.get_conn()?;
    let mut stmt = conn.prepare(
        "SELECT id, document, metadata, embedding FROM entries
         WHERE collection_id = ?1 ORDER BY seq",
    )?;

    let rows = stmt.query_map(params![collection_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Vec<u8>>(3)?,
        ))
    })?;

    let corrupt = |message: String| RagError::CorruptStore {
        path: dir.to_path_buf(),
        message,
    };

    let mut entries = Vec::new();
    for row in rows {
        let (id, text, metadata, embedding) = row?;

        let id = Uuid::parse_str(&id).map_err(|e| corrupt(format!("bad entry id '{}': {}", id, e)))?;
        let metadata: Value = serde_json::from_str(&metadata).map_err(|e| RagError::Json {
            source: e,
            context: format!("Failed to parse metadata of entry {}", id),
        })?;
        let embedding = decode_vector(&embedding)
            .filter(|v| v.len() == dimension)
            .ok_or_else(|| corrupt(format!("entry {} has a malformed embedding", id)))?;

        entries.push(StoreEntry {
            id,
            text,
            metadata,
            embedding,
        });
    }

    Ok(entries)
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}
