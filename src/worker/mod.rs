//! Fixed-size pool of long-lived, stateful workers
//!
//! Every worker slot owns one resource (for the indexer, one external
//! process). Items are handed out over a zero-capacity channel, so a
//! submission only completes once an idle slot takes it: producers are held
//! back to the pace of the slowest moment of the pool.

use crate::error::WorkerPoolError;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One pool slot
#[async_trait]
pub trait Worker<P>: Send + Sync + 'static
where
    P: Send + 'static,
{
    /// Resolve once the slot can accept work
    async fn wait_ready(&self, cancel: &CancellationToken) -> Result<()>;

    /// Handle one item; an error retires the slot
    async fn handle(&self, cancel: &CancellationToken, item: P) -> Result<()>;

    /// Finish outstanding work and release the slot's resource
    async fn wait_and_close(&self) -> Result<()>;
}

pub struct WorkerGroup<P, W> {
    workers: Vec<Arc<W>>,
    sender: flume::Sender<P>,
    dispatchers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl<P, W> WorkerGroup<P, W>
where
    P: Send + 'static,
    W: Worker<P>,
{
    /// Build `size` workers concurrently with `factory`
    ///
    /// Either every slot is created or none is: when one factory call fails,
    /// the slots already built are closed before the error is returned.
    pub async fn new<F, Fut>(
        size: usize,
        cancel: CancellationToken,
        factory: F,
    ) -> Result<Self, WorkerPoolError>
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = Result<W>>,
    {
        if size == 0 {
            return Err(WorkerPoolError::InvalidSize);
        }

        let results = join_all((0..size).map(&factory)).await;

        let mut workers = Vec::with_capacity(size);
        let mut failure = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(worker) => workers.push(Arc::new(worker)),
                Err(e) => {
                    tracing::error!("Failed to create worker {}: {:#}", index, e);
                    if failure.is_none() {
                        failure = Some(WorkerPoolError::CreationFailed {
                            index,
                            reason: format!("{:#}", e),
                        });
                    }
                }
            }
        }

        if let Some(err) = failure {
            for reason in close_all::<P, W>(&workers).await {
                tracing::warn!("Cleanup after failed pool creation: {}", reason);
            }
            return Err(err);
        }

        let (sender, receiver) = flume::bounded(0);
        let dispatchers = workers
            .iter()
            .enumerate()
            .map(|(index, worker)| {
                tokio::spawn(dispatch(
                    index,
                    worker.clone(),
                    receiver.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        tracing::info!("Started {} workers", size);

        Ok(Self {
            workers,
            sender,
            dispatchers,
            cancel,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Wait until every slot reports ready
    pub async fn wait_all_ready(&self) -> Result<(), WorkerPoolError> {
        let results = join_all(self.workers.iter().map(|w| w.wait_ready(&self.cancel))).await;

        let errors = collect_errors(results);
        if errors.is_empty() {
            Ok(())
        } else if self.cancel.is_cancelled() {
            Err(WorkerPoolError::Cancelled)
        } else {
            Err(WorkerPoolError::NotReady(errors))
        }
    }

    /// Hand an item to the next idle slot, waiting for one if all are busy
    pub async fn submit(&self, item: P) -> Result<(), WorkerPoolError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(WorkerPoolError::Cancelled),
            sent = self.sender.send_async(item) => sent.map_err(|_| WorkerPoolError::Closed),
        }
    }

    /// Stop accepting work, let every slot finish, then close them all
    pub async fn wait_and_close(self) -> Result<(), WorkerPoolError> {
        let Self {
            workers,
            sender,
            dispatchers,
            ..
        } = self;

        drop(sender);

        let mut errors = Vec::new();
        for (index, joined) in join_all(dispatchers).await.into_iter().enumerate() {
            if let Err(e) = joined {
                errors.push(format!("worker {}: dispatch task failed: {}", index, e));
            }
        }
        errors.extend(close_all::<P, W>(&workers).await);

        if errors.is_empty() {
            tracing::info!("All {} workers closed", workers.len());
            Ok(())
        } else {
            Err(WorkerPoolError::ShutdownFailed(errors))
        }
    }
}

async fn dispatch<P, W>(
    index: usize,
    worker: Arc<W>,
    receiver: flume::Receiver<P>,
    cancel: CancellationToken,
) where
    P: Send + 'static,
    W: Worker<P>,
{
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Worker {} cancelled", index);
                break;
            }
            item = receiver.recv_async() => match item {
                Ok(item) => item,
                Err(_) => break,
            },
        };

        if let Err(e) = worker.handle(&cancel, item).await {
            tracing::error!("Worker {} stopped after a failed item: {:#}", index, e);
            break;
        }
    }
}

async fn close_all<P, W>(workers: &[Arc<W>]) -> Vec<String>
where
    P: Send + 'static,
    W: Worker<P>,
{
    collect_errors(join_all(workers.iter().map(|w| w.wait_and_close())).await)
}

fn collect_errors(results: Vec<Result<()>>) -> Vec<String> {
    results
        .into_iter()
        .enumerate()
        .filter_map(|(index, result)| result.err().map(|e| format!("worker {}: {:#}", index, e)))
        .collect()
}
