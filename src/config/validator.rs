use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{RagError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every problem at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_paths(config, &mut errors);
        Self::validate_splitter(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RagError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_paths(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked by the commands themselves; a missing document
        // is only an error when a store actually has to be built
        if config.paths.document.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "paths.document",
                "Document path cannot be empty",
            ));
        }

        if config.paths.store_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "paths.store_dir",
                "Store directory cannot be empty",
            ));
        }
    }

    fn validate_splitter(config: &Config, errors: &mut Vec<ValidationError>) {
        let splitter = &config.splitter;

        if splitter.chunk_size == 0 {
            errors.push(ValidationError::new(
                "splitter.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        if splitter.chunk_overlap >= splitter.chunk_size {
            errors.push(ValidationError::new(
                "splitter.chunk_overlap",
                format!(
                    "Chunk overlap ({}) must be smaller than chunk size ({})",
                    splitter.chunk_overlap, splitter.chunk_size
                ),
            ));
        }

        if let Some(separator) = &splitter.separator {
            if separator.is_empty() {
                errors.push(ValidationError::new(
                    "splitter.separator",
                    "Separator cannot be empty (omit it for fixed windows)",
                ));
            } else if splitter.separator_is_regex {
                if let Err(e) = regex::Regex::new(separator) {
                    errors.push(ValidationError::new(
                        "splitter.separator",
                        format!("Invalid regex: {}", e),
                    ));
                }
            }
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.model.trim().is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        let index = &config.index;

        if index.hnsw_m == 0 {
            errors.push(ValidationError::new("index.hnsw_m", "Must be greater than 0"));
        }

        if index.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_construction",
                "Must be greater than 0",
            ));
        }

        if index.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_search",
                "Must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.k == 0 {
            errors.push(ValidationError::new(
                "retrieval.k",
                "k must be greater than 0",
            ));
        }

        if retrieval.fetch_k < retrieval.k {
            errors.push(ValidationError::new(
                "retrieval.fetch_k",
                format!(
                    "fetch_k ({}) must be at least k ({})",
                    retrieval.fetch_k, retrieval.k
                ),
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.lambda_mult) {
            errors.push(ValidationError::new(
                "retrieval.lambda_mult",
                format!(
                    "lambda_mult must be between 0.0 and 1.0, got {}",
                    retrieval.lambda_mult
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_paths(config: &Config) -> Vec<String> {
        match ConfigValidator::validate(config) {
            Err(RagError::ConfigValidation { errors }) => {
                errors.into_iter().map(|e| e.path).collect()
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigValidator::validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = Config::default();
        config.splitter.chunk_overlap = 1000;
        assert_eq!(error_paths(&config), vec!["splitter.chunk_overlap"]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.meta.schema_version = "0.9.0".to_string();
        config.embedding.batch_size = 0;
        config.retrieval.fetch_k = 2;
        config.retrieval.lambda_mult = 1.5;

        let paths = error_paths(&config);
        assert_eq!(
            paths,
            vec![
                "_meta.schema_version",
                "embedding.batch_size",
                "retrieval.fetch_k",
                "retrieval.lambda_mult",
            ]
        );
    }

    #[test]
    fn test_invalid_regex_separator() {
        let mut config = Config::default();
        config.splitter.separator = Some("[unclosed".to_string());
        config.splitter.separator_is_regex = true;
        assert_eq!(error_paths(&config), vec!["splitter.separator"]);

        config.splitter.separator_is_regex = false;
        assert!(ConfigValidator::validate(&config).is_ok());
    }
}
