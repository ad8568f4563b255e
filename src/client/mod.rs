//! Pipeline driver: walk a tree, extract chunks, feed them to the indexer pool
//!
//! ```no_run
//! use code_memory::{Config, IndexClient};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = IndexClient::new(Config::load(None)?);
//!     let response = client
//!         .index_directory(Path::new("./src"), CancellationToken::new())
//!         .await?;
//!     println!("Indexed {} chunks", response.chunks_created);
//!     Ok(())
//! }
//! ```

mod indexer_worker;

pub use indexer_worker::IndexerWorker;

use crate::config::Config;
use crate::error::IndexerError;
use crate::indexer::{ChunkExtractor, CodeChunk, FileWalker};
use crate::types::IndexResponse;
use crate::worker::{Worker, WorkerGroup};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Paths buffered between the blocking walker and the async side
const PATH_BUFFER: usize = 128;

/// Helper macro to check for cancellation and return early if cancelled
macro_rules! check_cancelled {
    ($cancel_token:expr) => {
        if $cancel_token.is_cancelled() {
            tracing::info!("Indexing operation cancelled");
            anyhow::bail!("Indexing was cancelled");
        }
    };
}

/// What became of one discovered file
enum FileOutcome {
    Chunks(Vec<CodeChunk>),
    /// Not indexed; the reason is recorded when it is worth reporting
    Skipped(Option<String>),
}

/// Blocking walker streaming paths to the async side
struct Discovery {
    paths: mpsc::Receiver<PathBuf>,
    walker: JoinHandle<Result<usize>>,
    cancel_watcher: JoinHandle<()>,
}

impl Discovery {
    /// Stop the walker and fold its outcome into the response
    async fn finish(self, response: &mut IndexResponse, cancel: &CancellationToken) {
        let Self {
            paths,
            walker,
            cancel_watcher,
        } = self;
        // Unblocks a walker still waiting to hand over a path
        drop(paths);
        cancel_watcher.abort();

        match walker.await {
            Ok(Ok(visited)) => tracing::debug!("Walker visited {} files", visited),
            Ok(Err(e)) if cancel.is_cancelled() => {
                tracing::debug!("Walker stopped: {:#}", e);
            }
            Ok(Err(e)) => {
                tracing::warn!("Directory walk failed: {:#}", e);
                response.errors.push(format!("Directory walk failed: {:#}", e));
            }
            Err(e) => response.errors.push(format!("Walker task failed: {}", e)),
        }
    }
}

/// Indexes directories through a pool of external indexer processes
#[derive(Clone)]
pub struct IndexClient {
    config: Arc<Config>,
    extractor: Arc<ChunkExtractor>,
}

impl IndexClient {
    pub fn new(config: Config) -> Self {
        Self::with_extractor(config, ChunkExtractor::default())
    }

    pub fn with_extractor(config: Config, extractor: ChunkExtractor) -> Self {
        Self {
            config: Arc::new(config),
            extractor: Arc::new(extractor),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Index every supported file under `root`
    ///
    /// Starts `indexer.workers` indexer processes and always shuts them down
    /// before returning.
    pub async fn index_directory(
        &self,
        root: &Path,
        cancel: CancellationToken,
    ) -> Result<IndexResponse> {
        ensure_directory(root)?;

        let config = self.config.clone();
        let factory_cancel = cancel.clone();
        let pool = WorkerGroup::new(self.config.indexer.workers, cancel.clone(), |index| {
            let config = config.clone();
            let cancel = factory_cancel.clone();
            async move { IndexerWorker::start(index, &config, cancel).await }
        })
        .await
        .context("Failed to start indexer workers")?;

        self.index_with_pool(pool, root, cancel).await
    }

    /// Index `root` through an existing pool, closing the pool at the end
    pub async fn index_with_pool<W>(
        &self,
        pool: WorkerGroup<Vec<CodeChunk>, W>,
        root: &Path,
        cancel: CancellationToken,
    ) -> Result<IndexResponse>
    where
        W: Worker<Vec<CodeChunk>>,
    {
        let start = Instant::now();

        if let Err(e) = ensure_directory(root) {
            close_after_failure(pool).await;
            return Err(e);
        }

        if self.config.indexer.wait_ready {
            let timeout = Duration::from_secs(self.config.indexer.ready_timeout_secs);
            tracing::info!("Waiting for {} indexer workers to be ready", pool.size());
            let ready = match tokio::time::timeout(timeout, pool.wait_all_ready()).await {
                Ok(ready) => ready.context("Indexer workers failed to start"),
                Err(_) => Err(anyhow::anyhow!(
                    "Indexer workers were not ready after {}s",
                    timeout.as_secs()
                )),
            };
            if let Err(e) = ready {
                close_after_failure(pool).await;
                return Err(e);
            }
        }

        let mut response = IndexResponse::default();
        let mut discovery = self.discover(root, &cancel);
        let mut submit_error = None;

        while let Some(path) = discovery.paths.recv().await {
            if cancel.is_cancelled() {
                break;
            }

            match self.extract_file(&path).await {
                FileOutcome::Chunks(chunks) => {
                    response.files_indexed += 1;
                    if chunks.is_empty() {
                        continue;
                    }
                    let count = chunks.len();
                    match pool.submit(chunks).await {
                        Ok(()) => {
                            response.chunks_created += count;
                            response.batches_submitted += 1;
                        }
                        Err(e) => {
                            submit_error = Some(e);
                            break;
                        }
                    }
                }
                FileOutcome::Skipped(reason) => {
                    response.files_skipped += 1;
                    response.errors.extend(reason);
                }
            }
        }

        discovery.finish(&mut response, &cancel).await;

        tracing::info!(
            "Submitted {} chunks from {} files, waiting for the indexers to finish",
            response.chunks_created,
            response.files_indexed
        );
        if let Err(e) = pool.wait_and_close().await {
            tracing::warn!("{}", e);
            response.errors.push(e.to_string());
        }

        check_cancelled!(cancel);
        if let Some(e) = submit_error {
            return Err(e).context("Indexing stopped early");
        }

        response.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Indexed {} files ({} skipped, {} chunks) in {}ms",
            response.files_indexed,
            response.files_skipped,
            response.chunks_created,
            response.duration_ms
        );
        Ok(response)
    }

    /// Extract chunks from every supported file under `root` without indexing them
    pub async fn collect_chunks(
        &self,
        root: &Path,
        cancel: CancellationToken,
    ) -> Result<(Vec<CodeChunk>, IndexResponse)> {
        let start = Instant::now();
        ensure_directory(root)?;

        let mut response = IndexResponse::default();
        let mut chunks = Vec::new();
        let mut discovery = self.discover(root, &cancel);

        while let Some(path) = discovery.paths.recv().await {
            if cancel.is_cancelled() {
                break;
            }
            match self.extract_file(&path).await {
                FileOutcome::Chunks(found) => {
                    response.files_indexed += 1;
                    response.chunks_created += found.len();
                    chunks.extend(found);
                }
                FileOutcome::Skipped(reason) => {
                    response.files_skipped += 1;
                    response.errors.extend(reason);
                }
            }
        }

        discovery.finish(&mut response, &cancel).await;
        check_cancelled!(cancel);

        response.duration_ms = start.elapsed().as_millis() as u64;
        Ok((chunks, response))
    }

    fn discover(&self, root: &Path, cancel: &CancellationToken) -> Discovery {
        // Create a cancellation flag for the blocking file walker
        let cancelled_flag = Arc::new(AtomicBool::new(cancel.is_cancelled()));
        let cancelled_flag_clone = cancelled_flag.clone();
        let cancel_token_clone = cancel.clone();

        let cancel_watcher = tokio::spawn(async move {
            cancel_token_clone.cancelled().await;
            cancelled_flag_clone.store(true, Ordering::Relaxed);
            tracing::debug!("Cancellation flag set for file walker");
        });

        let indexing = &self.config.indexing;
        let walker = FileWalker::new(root)
            .with_extensions(self.extractor.extensions())
            .with_skip_dirs(indexing.skip_dirs.clone())
            .with_gitignore(indexing.respect_gitignore)
            .with_cancellation_flag(cancelled_flag);

        let (path_tx, paths) = mpsc::channel(PATH_BUFFER);
        let walker = tokio::task::spawn_blocking(move || {
            walker.walk(|path| {
                path_tx
                    .blocking_send(path.to_path_buf())
                    .map_err(|_| anyhow::anyhow!("Path receiver was dropped"))
            })
        });

        Discovery {
            paths,
            walker,
            cancel_watcher,
        }
    }

    async fn extract_file(&self, path: &Path) -> FileOutcome {
        let max_file_size = self.config.indexing.max_file_size as u64;
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.len() > max_file_size => {
                tracing::debug!("Skipping large file: {:?}", path);
                return FileOutcome::Skipped(None);
            }
            Ok(_) => {}
            Err(e) => return FileOutcome::Skipped(Some(format!("{}: {}", path.display(), e))),
        }

        let source = match tokio::fs::read(path).await {
            Ok(source) => source,
            Err(e) => return FileOutcome::Skipped(Some(format!("{}: {}", path.display(), e))),
        };

        let extractor = self.extractor.clone();
        let file_path = path.to_string_lossy().into_owned();
        let parsed =
            tokio::task::spawn_blocking(move || extractor.parse_file(&file_path, &source)).await;

        match parsed {
            Ok(Ok(chunks)) => {
                tracing::debug!("Extracted {} chunks from {:?}", chunks.len(), path);
                FileOutcome::Chunks(chunks)
            }
            Ok(Err(e)) => {
                let err = IndexerError::from(e);
                if err.is_skippable() {
                    tracing::warn!("Skipping {:?}: {}", path, err);
                } else {
                    tracing::error!("Failed to extract chunks from {:?}: {}", path, err);
                }
                FileOutcome::Skipped(Some(err.to_string()))
            }
            Err(e) => FileOutcome::Skipped(Some(format!(
                "{}: extraction task failed: {}",
                path.display(),
                e
            ))),
        }
    }
}

fn ensure_directory(root: &Path) -> Result<()> {
    if !root.exists() {
        anyhow::bail!("Root directory does not exist: {:?}", root);
    }
    if !root.is_dir() {
        anyhow::bail!("Root path is not a directory: {:?}", root);
    }
    Ok(())
}

async fn close_after_failure<W>(pool: WorkerGroup<Vec<CodeChunk>, W>)
where
    W: Worker<Vec<CodeChunk>>,
{
    if let Err(e) = pool.wait_and_close().await {
        tracing::warn!("{}", e);
    }
}
