//! code-memory CLI: chunk a source tree and feed it to the indexer processes

use anyhow::Result;
use clap::Parser;
use code_memory::{Config, IndexClient};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "code-memory")]
#[command(version)]
#[command(about = "Chunk source code with tree-sitter and index it through external embedding processes")]
#[command(long_about = r#"
Without --index, lists the chunks that would be indexed, one per line.

Example usage:
  code-memory ./src
  code-memory --index --workers 8 ./src
"#)]
struct Cli {
    /// Directory to walk
    path: PathBuf,

    /// Send the chunks to the indexer processes
    #[arg(long)]
    index: bool,

    /// Number of indexer processes (overrides the config file)
    #[arg(long, requires = "index")]
    workers: Option<usize>,

    /// Config file (defaults to <config dir>/code-memory/config.toml)
    #[arg(short, long, env = "CODE_MEMORY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging, including indexer output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        config.indexer.workers = workers;
        config.validate()?;
    }

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            ctrl_c_cancel.cancel();
        }
    });

    let client = IndexClient::new(config);

    let response = if cli.index {
        tracing::info!(
            "Indexing {} with {} workers",
            cli.path.display(),
            client.config().indexer.workers
        );
        client.index_directory(&cli.path, cancel).await?
    } else {
        let (chunks, response) = client.collect_chunks(&cli.path, cancel).await?;
        for chunk in &chunks {
            let meta = &chunk.metadata;
            println!(
                "{}\t{}\t{}-{}\t{}",
                chunk.id, meta.chunk_type, meta.start_line, meta.end_line, meta.file_path
            );
        }
        response
    };

    for error in &response.errors {
        tracing::warn!("{}", error);
    }
    tracing::info!(
        "{} files, {} skipped, {} chunks in {}ms",
        response.files_indexed,
        response.files_skipped,
        response.chunks_created,
        response.duration_ms
    );

    Ok(())
}
