use bookrag::cli::{Cli, Commands, ConfigAction};
use bookrag::config::{Config, ConfigValidator};
use bookrag::embedding::FastEmbedProvider;
use bookrag::error::{RagError, Result};
use bookrag::ingest::{IngestOutcome, IngestSettings, Ingestor};
use bookrag::retrieval::{RetrievalSettings, RetrievedChunk, Retriever};
use bookrag::store::PersistentStore;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Ingest { document, store } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ingest(&config, document, store)?;
        }
        Commands::Query {
            query,
            store,
            k,
            fetch_k,
            lambda_mult,
            search_type,
            json,
        } => {
            let mut config = load_config(cli.config, cli.profile)?;
            if let Some(k) = k {
                config.retrieval.k = k;
            }
            if let Some(fetch_k) = fetch_k {
                config.retrieval.fetch_k = fetch_k;
            }
            if let Some(lambda_mult) = lambda_mult {
                config.retrieval.lambda_mult = lambda_mult;
            }
            if let Some(search_type) = search_type {
                config.retrieval.search_type = search_type;
            }
            ConfigValidator::validate(&config)?;

            let query = query.unwrap_or_else(|| config.retrieval.query.clone());
            cmd_query(&config, &query, store, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "bookrag=debug" } else { "bookrag=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_ingest(config: &Config, document: Option<PathBuf>, store: Option<PathBuf>) -> Result<()> {
    let source = expand_path(document.as_deref().unwrap_or(&config.paths.document))?;
    let store_dir = expand_path(store.as_deref().unwrap_or(&config.paths.store_dir))?;
    let cache_dir = config
        .embedding
        .cache_dir
        .as_deref()
        .map(expand_path)
        .transpose()?;

    if !store_dir.exists() {
        println!("Persistent directory does not exist. Initializing the vector store...");
    }

    let ingestor = Ingestor::new(IngestSettings::from(config));
    let outcome = ingestor.run(&source, &store_dir, || {
        println!("Creating embeddings using {}...", config.embedding.model);
        let provider = FastEmbedProvider::new(&config.embedding.model, cache_dir)?;
        println!("Finished creating the embeddings!");
        Ok(provider)
    })?;

    match outcome {
        IngestOutcome::Created(report) => {
            println!("Finished creating and saving the vector store!");
            println!(
                "  {} chunks, {} dimensions, {} bytes on disk, {} ms",
                report.chunks, report.dimension, report.disk_bytes, report.duration_ms
            );
            println!("  Location: {}", report.store_dir.display());
        }
        IngestOutcome::AlreadyExists { source_changed, .. } => {
            println!("Vector store already created. No need to initialize again.");
            if source_changed == Some(true) {
                println!(
                    "  Note: {} changed since the store was built. Delete {} to re-ingest.",
                    source.display(),
                    store_dir.display()
                );
            }
        }
    }

    Ok(())
}

fn cmd_query(config: &Config, query: &str, store: Option<PathBuf>, json: bool) -> Result<()> {
    let store_dir = expand_path(store.as_deref().unwrap_or(&config.paths.store_dir))?;
    let cache_dir = config
        .embedding
        .cache_dir
        .as_deref()
        .map(expand_path)
        .transpose()?;

    let store = PersistentStore::open(&store_dir, &config.index)?;
    tracing::debug!(
        "Opened collection '{}' ({} entries, model {})",
        store.collection().name,
        store.entries().len(),
        store.collection().embedding_model
    );

    let provider = FastEmbedProvider::new(&config.embedding.model, cache_dir)?;
    let retriever = Retriever::new(store, provider, RetrievalSettings::from(&config.retrieval));
    let results = retriever.retrieve(query)?;

    if json {
        let output = serde_json::to_string_pretty(&results).map_err(|e| RagError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{output}");
    } else {
        print_results(&results);
    }

    Ok(())
}

fn print_results(results: &[RetrievedChunk]) {
    println!("\nRelevant Documents:");
    for (i, chunk) in results.iter().enumerate() {
        println!("Document {}:\n{}\n", i + 1, chunk.text);
        if !chunk.metadata.is_null() {
            println!("Source: {}\n", chunk.source().unwrap_or("Unknown"));
        }
    }
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, profile)?;

            let rendered = match section.as_deref() {
                None => toml::to_string_pretty(&config)?,
                Some("paths") => toml::to_string_pretty(&config.paths)?,
                Some("splitter") => toml::to_string_pretty(&config.splitter)?,
                Some("embedding") => toml::to_string_pretty(&config.embedding)?,
                Some("index") => toml::to_string_pretty(&config.index)?,
                Some("retrieval") => toml::to_string_pretty(&config.retrieval)?,
                Some(other) => {
                    return Err(RagError::Config(format!("Unknown config section: {}", other)));
                }
            };
            println!("{rendered}");
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RagError::io(e, format!("Failed to create config directory: {:?}", parent))
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'bookrag config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| RagError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| RagError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
