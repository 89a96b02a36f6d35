//! CLI command definitions and parsing
use crate::config::SearchType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bookrag",
    version,
    author = "neur0map",
    about = "Retrieval-augmented question answering over a single text document",
    long_about = "bookrag splits a text document into overlapping chunks, embeds them with a local \
                  sentence-transformer model and persists them once. Queries are answered by \
                  retrieving the most relevant and mutually diverse chunks."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/bookrag/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply on top of the config file
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the vector store from the source document (no-op if it exists)
    Ingest {
        /// Source document (defaults to paths.document)
        #[arg(short, long)]
        document: Option<PathBuf>,

        /// Store directory (defaults to paths.store_dir)
        #[arg(short, long)]
        store: Option<PathBuf>,
    },

    /// Retrieve the chunks most relevant to a query
    Query {
        /// Query text (defaults to retrieval.query)
        query: Option<String>,

        /// Store directory (defaults to paths.store_dir)
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Number of chunks to return
        #[arg(short)]
        k: Option<usize>,

        /// Number of candidates considered by MMR
        #[arg(long)]
        fetch_k: Option<usize>,

        /// MMR relevance weight between 0.0 (diverse) and 1.0 (relevant)
        #[arg(long = "lambda")]
        lambda_mult: Option<f32>,

        /// Ranking strategy
        #[arg(long, value_parser = parse_search_type)]
        search_type: Option<SearchType>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_search_type(value: &str) -> Result<SearchType, String> {
    value.parse()
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
