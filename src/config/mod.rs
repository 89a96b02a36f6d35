//! Configuration management for bookrag
//!
//! Every value has a default that reproduces the stock run (the Lord of the
//! Rings text, a 1000/50 splitter, MiniLM embeddings, MMR with k=4,
//! fetch_k=15, lambda=0.3), so both commands work with no config file at all.

use crate::embedding::DEFAULT_MODEL;
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub paths: PathsConfig,
    pub splitter: SplitterConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
}

/// Where the source document and the persistent store live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub document: PathBuf,
    pub store_dir: PathBuf,
}

/// Text splitter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Split on this separator and merge pieces; fixed windows when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default)]
    pub separator_is_regex: bool,
    #[serde(default = "default_true")]
    pub strip_whitespace: bool,
}

fn default_true() -> bool {
    true
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

/// HNSW neighbor index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    /// Collections with at most this many entries are scanned exhaustively
    #[serde(default = "default_exact_scan_limit")]
    pub exact_scan_limit: usize,
}

fn default_exact_scan_limit() -> usize {
    64
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
            exact_scan_limit: default_exact_scan_limit(),
        }
    }
}

/// How retrieved chunks are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Maximal marginal relevance over the `fetch_k` nearest candidates
    Mmr,
    /// Plain top-k by similarity
    Similarity,
}

impl std::str::FromStr for SearchType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mmr" => Ok(Self::Mmr),
            "similarity" => Ok(Self::Similarity),
            other => Err(format!(
                "unknown search type '{}', expected 'mmr' or 'similarity'",
                other
            )),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub search_type: SearchType,
    pub k: usize,
    pub fetch_k: usize,
    pub lambda_mult: f32,
    /// Query used when none is given on the command line
    pub query: String,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_type: Option<SearchType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lambda_mult: Option<f32>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| RagError::io(e, format!("Failed to read config file: {:?}", path)))?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| RagError::io(e, format!("Failed to write config file: {:?}", path)))?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| RagError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(search_type) = overrides.search_type {
            self.retrieval.search_type = search_type;
        }
        if let Some(k) = overrides.k {
            self.retrieval.k = k;
        }
        if let Some(fetch_k) = overrides.fetch_k {
            self.retrieval.fetch_k = fetch_k;
        }
        if let Some(lambda_mult) = overrides.lambda_mult {
            self.retrieval.lambda_mult = lambda_mult;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: BOOKRAG_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("BOOKRAG_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "PATHS__DOCUMENT" => self.paths.document = PathBuf::from(value),
            "PATHS__STORE_DIR" => self.paths.store_dir = PathBuf::from(value),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__CACHE_DIR" => self.embedding.cache_dir = Some(PathBuf::from(value)),
            "RETRIEVAL__SEARCH_TYPE" => {
                self.retrieval.search_type =
                    value
                        .parse()
                        .map_err(|message| RagError::InvalidConfigValue {
                            path: path.to_string(),
                            message,
                        })?;
            }
            "RETRIEVAL__K" => self.retrieval.k = parse_env(path, value)?,
            "RETRIEVAL__FETCH_K" => self.retrieval.fetch_k = parse_env(path, value)?,
            "RETRIEVAL__LAMBDA_MULT" => self.retrieval.lambda_mult = parse_env(path, value)?,
            "INDEX__HNSW_EF_SEARCH" => self.index.hnsw_ef_search = parse_env(path, value)?,
            "INDEX__EXACT_SCAN_LIMIT" => self.index.exact_scan_limit = parse_env(path, value)?,
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RagError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("bookrag").join("config.toml"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| RagError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
            },
            paths: PathsConfig {
                document: PathBuf::from("documents").join("lord_of_the_rings.txt"),
                store_dir: PathBuf::from("db").join("chroma_db"),
            },
            splitter: SplitterConfig {
                chunk_size: 1000,
                chunk_overlap: 50,
                separator: None,
                separator_is_regex: false,
                strip_whitespace: true,
            },
            embedding: EmbeddingConfig {
                model: DEFAULT_MODEL.to_string(),
                batch_size: 32,
                cache_dir: None,
            },
            index: IndexConfig::default(),
            retrieval: RetrievalConfig {
                search_type: SearchType::Mmr,
                k: 4,
                fetch_k: 15,
                lambda_mult: 0.3,
                query: "Where does Gandalf meet Frodo?".to_string(),
            },
            profiles: HashMap::new(),
        }
    }
}
