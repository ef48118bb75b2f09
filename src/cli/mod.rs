//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vaultdex",
    version,
    about = "Incremental semantic index and hybrid search over a folder of notes",
    long_about = "Vaultdex keeps a persistent embedding index of a notes folder in sync with \
                  the files on disk, re-embedding only what changed, and answers queries by \
                  blending vector similarity with salient-term matches."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/vaultdex/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index new and changed files (Ctrl-C stops and keeps finished files)
    Index {
        /// Re-embed every file, changed or not
        #[arg(short, long)]
        force: bool,
    },

    /// Remove index entries for files that no longer exist
    Gc,

    /// Delete the whole index
    Clear {
        /// Confirm that the index should be wiped
        #[arg(long)]
        yes: bool,
    },

    /// Report which files are indexed, unindexed or empty
    List,

    /// Remove specific files from the index
    Remove {
        /// Paths relative to the corpus root
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Show the stored chunks of specific files (debugging aid)
    Inspect {
        /// Paths relative to the corpus root
        #[arg(required = true)]
        paths: Vec<String>,

        /// Show chunks in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Search the index
    Query {
        /// Search query text
        query: String,

        /// Salient term for lexical matching (repeatable)
        #[arg(short, long = "term", value_name = "TERM")]
        terms: Vec<String>,

        /// Weight of term matches against vector similarity, 0..=1
        #[arg(long)]
        text_weight: Option<f32>,

        /// Minimum blended score, 0..=1
        #[arg(long)]
        min_score: Option<f32>,

        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Find notes similar to an indexed file
    Related {
        /// Path relative to the corpus root
        path: String,

        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,

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
    Show,

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

        /// Notes folder to index
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
