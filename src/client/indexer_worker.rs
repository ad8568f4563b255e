//! Pool slot backed by one external indexer process

use crate::config::Config;
use crate::embedding::{IndexStatus, RunningIndexer};
use crate::error::IndexerError;
use crate::indexer::CodeChunk;
use crate::worker::Worker;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct IndexerWorker {
    index: usize,
    indexer: RunningIndexer,
    batch_size: usize,
    drain_timeout: Duration,
}

impl IndexerWorker {
    /// Stage the assets and start the configured indexer process
    pub async fn start(index: usize, config: &Config, cancel: CancellationToken) -> Result<Self> {
        let indexer = RunningIndexer::run(&config.indexer, cancel)
            .await
            .with_context(|| format!("Failed to start indexer process for worker {}", index))?;

        tracing::debug!("Worker {} started its indexer process", index);
        Ok(Self::from_running(index, indexer, config))
    }

    /// Wrap an already running indexer
    ///
    /// Its output is logged unless the caller took the output stream first.
    pub fn from_running(index: usize, mut indexer: RunningIndexer, config: &Config) -> Self {
        if let Some(output) = indexer.take_output() {
            tokio::spawn(log_output(index, output));
        }

        Self {
            index,
            indexer,
            batch_size: config.indexing.batch_size.max(1),
            drain_timeout: Duration::from_secs(config.indexer.drain_timeout_secs),
        }
    }
}

#[async_trait]
impl Worker<Vec<CodeChunk>> for IndexerWorker {
    async fn wait_ready(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => anyhow::bail!("Cancelled while waiting for indexer {}", self.index),
            ready = self.indexer.wait_ready() => ready
                .with_context(|| format!("Indexer {} did not become ready", self.index)),
        }
    }

    async fn handle(&self, cancel: &CancellationToken, chunks: Vec<CodeChunk>) -> Result<()> {
        for batch in chunks.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                tracing::debug!("Worker {} dropping remaining batches: cancelled", self.index);
                break;
            }
            if let Err(e) = self.indexer.process_chunks(batch).await {
                let err = IndexerError::from(e);
                if err.is_cancelled() {
                    tracing::debug!("Worker {} stopped writing: cancelled", self.index);
                    return Ok(());
                }
                return Err(err)
                    .with_context(|| format!("Worker {} failed to send a batch", self.index));
            }
        }
        Ok(())
    }

    async fn wait_and_close(&self) -> Result<()> {
        if tokio::time::timeout(self.drain_timeout, self.indexer.wait_for_completion())
            .await
            .is_err()
        {
            tracing::warn!(
                "Worker {} gave up waiting for {} pending batches after {}s",
                self.index,
                self.indexer.pending(),
                self.drain_timeout.as_secs()
            );
        }

        self.indexer
            .close()
            .await
            .with_context(|| format!("Failed to close indexer {}", self.index))
    }
}

async fn log_output(index: usize, mut output: mpsc::Receiver<String>) {
    while let Some(line) = output.recv().await {
        match IndexStatus::parse(&line) {
            Some(status) if status.is_error() => tracing::warn!(
                worker = index,
                "Indexer rejected a batch: {}",
                status.message.as_deref().unwrap_or("no message")
            ),
            _ => tracing::debug!(worker = index, "{}", line),
        }
    }
}
