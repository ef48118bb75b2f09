use std::path::PathBuf;
use std::sync::Arc;
use vaultdex::cli::{Cli, Commands, ConfigAction};
use vaultdex::config::{Config, ConfigValidator};
use vaultdex::embedding::FastEmbedProvider;
use vaultdex::error::{Result, VaultdexError};
use vaultdex::manager::VectorStoreManager;
use vaultdex::retrieval::RetrievalConfig;
use vaultdex::storage::ChunkSummary;
use vaultdex::sync::IndexEvent;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Index { force } => cmd_index(cli.config, force).await?,
        Commands::Gc => cmd_gc(cli.config).await?,
        Commands::Clear { yes } => cmd_clear(cli.config, yes).await?,
        Commands::List => cmd_list(cli.config).await?,
        Commands::Remove { paths } => cmd_remove(cli.config, paths).await?,
        Commands::Inspect { paths, json } => cmd_inspect(cli.config, &paths, json).await?,
        Commands::Query {
            query,
            terms,
            text_weight,
            min_score,
            limit,
            json,
        } => {
            let config = load_config(cli.config)?;
            let retrieval = RetrievalConfig {
                min_similarity_score: min_score.unwrap_or(config.retrieval.min_similarity_score),
                max_k: limit.unwrap_or(config.retrieval.max_k),
                text_weight: text_weight.unwrap_or(config.retrieval.text_weight),
            };
            cmd_query(&config, &query, &terms, &retrieval, json).await?;
        }
        Commands::Related { path, limit, json } => {
            let config = load_config(cli.config)?;
            let retrieval = RetrievalConfig {
                max_k: limit.unwrap_or(config.retrieval.max_k),
                ..config.retrieval
            };
            cmd_related(&config, &path, &retrieval, json).await?;
        }
        Commands::Config { action } => cmd_config(cli.config, action)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "vaultdex=debug" } else { "vaultdex=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'vaultdex config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    Config::load(&path)
}

fn build_manager(config: &Config) -> Result<VectorStoreManager> {
    tracing::debug!("Loading embedding model {}", config.embedding.model);
    let provider = FastEmbedProvider::new(&config.embedding.model)?;
    VectorStoreManager::from_config(config, Arc::new(provider))
}

async fn cmd_index(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let manager = build_manager(&config)?;

    manager.on_event(|event| match event {
        IndexEvent::FileIndexed { path, chunks } => println!("  indexed {} ({} chunks)", path, chunks),
        IndexEvent::FileFailed { path, reason } => eprintln!("  failed {}: {}", path, reason),
        _ => {}
    });

    let run = manager.index_vault_to_vector_store(force);
    tokio::pin!(run);

    let report = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping after the current file");
            manager.cancel_indexing();
            run.await
        }
    };

    manager.on_unload().await?;
    let report = report?;

    println!(
        "✓ {} files indexed, {} unchanged, {} emptied, {} failed",
        report.processed, report.skipped, report.removed_empty, report.failed
    );
    if report.cancelled {
        println!("  Indexing was cancelled; run again to finish");
    }
    Ok(())
}

async fn cmd_gc(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let manager = build_manager(&config)?;

    let removed = manager.garbage_collect_vector_store().await?;
    println!("✓ Garbage collection completed: {} documents removed", removed);
    Ok(())
}

async fn cmd_clear(config_path: Option<PathBuf>, yes: bool) -> Result<()> {
    if !yes {
        println!("This deletes the whole index. Re-run with --yes to confirm.");
        return Ok(());
    }

    let config = load_config(config_path)?;
    let manager = build_manager(&config)?;

    manager.clear_index().await?;
    println!("✓ Index cleared");
    Ok(())
}

async fn cmd_list(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let manager = build_manager(&config)?;

    let status = manager.files_status().await?;
    if status.is_empty() {
        println!("No files found in {}", config.corpus.root.display());
        return Ok(());
    }
    print!("{}", status.to_markdown());
    Ok(())
}

async fn cmd_remove(config_path: Option<PathBuf>, paths: Vec<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let manager = build_manager(&config)?;

    let removed = manager.remove_docs(&paths).await?;
    println!("✓ Removed {} of {} files from the index", removed, paths.len());
    Ok(())
}

#[derive(serde::Serialize)]
struct InspectedFile {
    path: String,
    indexed: bool,
    chunks: Vec<ChunkSummary>,
}

async fn cmd_inspect(config_path: Option<PathBuf>, paths: &[String], json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let manager = build_manager(&config)?;

    let files: Vec<InspectedFile> = manager
        .get_docs(paths)
        .await?
        .into_iter()
        .map(|(path, chunks)| InspectedFile {
            indexed: !chunks.is_empty(),
            chunks: chunks.iter().map(|c| c.summary(200)).collect(),
            path,
        })
        .collect();

    if json {
        println!("{}", to_json(&files)?);
        return Ok(());
    }

    for file in &files {
        println!("## {}", file.path);
        if !file.indexed {
            println!("  not indexed");
            continue;
        }
        for chunk in &file.chunks {
            println!(
                "- {} @{} hash={} mtime={} embedding={}",
                chunk.id, chunk.offset, chunk.content_hash, chunk.mtime, chunk.embedding_len
            );
            if !chunk.metadata.is_empty() {
                println!("  metadata: {}", to_json(&chunk.metadata)?.replace('\n', " "));
            }
            println!("  {}", chunk.preview.replace('\n', " "));
        }
    }
    Ok(())
}

async fn cmd_query(
    config: &Config,
    query: &str,
    terms: &[String],
    retrieval: &RetrievalConfig,
    json: bool,
) -> Result<()> {
    let manager = build_manager(config)?;
    let results = manager.retrieve(query, terms, retrieval).await?;

    if json {
        println!("{}", to_json(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results above {:.2}", retrieval.min_similarity_score);
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{:>2}. {} [{:.3}] (vector {:.3}, terms {:.3})",
            rank + 1,
            result.chunk.path,
            result.score,
            result.vector_score,
            result.lexical_score
        );
        println!("    {}", result.preview(120).replace('\n', " "));
    }
    Ok(())
}

async fn cmd_related(
    config: &Config,
    path: &str,
    retrieval: &RetrievalConfig,
    json: bool,
) -> Result<()> {
    let manager = build_manager(config)?;
    let notes = manager.find_relevant_notes(path, retrieval).await?;

    if json {
        println!("{}", to_json(&notes)?);
        return Ok(());
    }

    if notes.is_empty() {
        println!("No related notes for {}", path);
        return Ok(());
    }

    for note in &notes {
        println!("{:.3}  {}", note.score, note.path);
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| VaultdexError::Json {
        source: e,
        context: "Failed to serialize results".to_string(),
    })
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Corpus root: {}", config.corpus.root.display());
        }
        ConfigAction::Init { force, root } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let mut config = Config::default();
            config.storage.data_dir = Config::default_data_dir()?;
            if let Some(root) = root {
                config.corpus.root = root;
            }
            config.save(&path)?;

            println!("✓ Configuration created at: {}", path.display());
            println!("  Corpus root: {}", config.corpus.root.display());
            println!("  Index: {}", config.database_path().display());
        }
    }
    Ok(())
}
