//! Supervision of one external indexer process

use super::assets::{self, CHROMA_DIR, LIB_DIR};
use super::protocol::{IndexRequest, LineKind, PendingCounter, classify};
use crate::config::IndexerConfig;
use crate::error::ProcessError;
use crate::indexer::CodeChunk;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const LINE_BUFFER: usize = 256;
const OUTPUT_BUFFER: usize = 1024;

/// Program, arguments and directory of an indexer process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl IndexerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Default command for a config: `<program> <args..> --db-path <wd>/chroma`, run in `<wd>/lib`
    pub fn from_config(config: &IndexerConfig) -> Self {
        let wd = config.working_dir();
        Self::new(config.program.clone())
            .args(config.args.iter().cloned())
            .arg("--db-path")
            .arg(wd.join(CHROMA_DIR).to_string_lossy())
            .current_dir(wd.join(LIB_DIR))
    }
}

/// State shared between the supervisor handle and its forwarding task
#[derive(Default)]
struct ProtocolState {
    pending: PendingCounter,
    drained: Notify,
    exited: AtomicBool,
}

impl ProtocolState {
    /// One status line came back
    fn status_received(&self) {
        if self.pending.decrement() == 0 {
            // Not stored: only tasks already waiting are woken
            self.drained.notify_waiters();
        }
    }

    fn mark_exited(&self) {
        self.exited.store(true, Ordering::SeqCst);
        self.drained.notify_waiters();
    }

    fn is_settled(&self) -> bool {
        self.pending.get() <= 0 || self.exited.load(Ordering::SeqCst)
    }
}

/// A spawned indexer process and the tasks reading its output
pub struct RunningIndexer {
    program: String,
    child: Mutex<Child>,
    stdin: Mutex<Option<ChildStdin>>,
    output: Option<mpsc::Receiver<String>>,
    ready: watch::Receiver<bool>,
    state: Arc<ProtocolState>,
    tasks: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl RunningIndexer {
    /// Stage the script assets and start the configured indexer
    pub async fn run(
        config: &IndexerConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ProcessError> {
        let wd = config.working_dir();
        let staging_dir = wd.clone();
        tokio::task::spawn_blocking(move || assets::prepare_working_directory(&staging_dir))
            .await
            .map_err(|e| ProcessError::WorkingDirectory {
                path: wd.display().to_string(),
                reason: e.to_string(),
            })??;

        Self::spawn(IndexerCommand::from_config(config), cancel)
    }

    /// Start a process and wire its pipes; no asset staging
    pub fn spawn(command: IndexerCommand, cancel: CancellationToken) -> Result<Self, ProcessError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| ProcessError::SpawnFailed {
            program: command.program.clone(),
            reason: e.to_string(),
        })?;

        let Some(stdin) = child.stdin.take() else {
            return Err(abort_spawn(&mut child, "stdin"));
        };
        let Some(stdout) = child.stdout.take() else {
            return Err(abort_spawn(&mut child, "stdout"));
        };
        let Some(stderr) = child.stderr.take() else {
            return Err(abort_spawn(&mut child, "stderr"));
        };

        tracing::debug!(
            "Spawned indexer '{}' (pid {:?}) with args {:?}",
            command.program,
            child.id(),
            command.args
        );

        let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER);
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_BUFFER);
        let (ready_tx, ready_rx) = watch::channel(false);
        let state = Arc::new(ProtocolState::default());

        let tasks = vec![
            spawn_reader(stdout, "stdout", line_tx.clone(), cancel.clone()),
            spawn_reader(stderr, "stderr", line_tx, cancel.clone()),
            tokio::spawn(forward_output(
                line_rx,
                output_tx,
                ready_tx,
                state.clone(),
                cancel.clone(),
            )),
        ];

        Ok(Self {
            program: command.program,
            child: Mutex::new(child),
            stdin: Mutex::new(Some(stdin)),
            output: Some(output_rx),
            ready: ready_rx,
            state,
            tasks,
            cancel,
        })
    }

    /// Take the merged stdout/stderr line stream
    ///
    /// Available once. Whoever holds it must keep reading, or the protocol
    /// stalls once the buffer is full; dropping it is fine.
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<String>> {
        self.output.take()
    }

    /// Send one batch of chunks
    ///
    /// The write is abandoned on cancellation, so a process that stopped
    /// reading its stdin cannot hold the caller once the pipe buffer is full.
    pub async fn process_chunks(&self, chunks: &[CodeChunk]) -> Result<(), ProcessError> {
        let line = IndexRequest::new(chunks).to_line()?;

        let mut stdin = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ProcessError::Cancelled),
            stdin = self.stdin.lock() => stdin,
        };
        let Some(pipe) = stdin.as_mut() else {
            return Err(ProcessError::WriteFailed("stdin is closed".to_string()));
        };

        self.state.pending.increment();
        let written = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!("Abandoned a write of {} chunks to {}: cancelled", chunks.len(), self.program);
                self.state.status_received();
                return Err(ProcessError::Cancelled);
            }
            written = async {
                pipe.write_all(line.as_bytes()).await?;
                pipe.flush().await
            } => written,
        };

        if let Err(e) = written {
            tracing::error!("Failed to write {} chunks to {}: {}", chunks.len(), self.program, e);
            self.state.status_received();
            return Err(ProcessError::WriteFailed(e.to_string()));
        }
        Ok(())
    }

    /// Wait until every written batch has been answered
    ///
    /// Returns early when the process exits or the token is cancelled.
    pub async fn wait_for_completion(&self) {
        loop {
            let notified = self.state.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.state.is_settled() {
                return;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = &mut notified => {}
            }
        }
    }

    /// Wait for the readiness line
    pub async fn wait_ready(&self) -> Result<(), ProcessError> {
        let mut ready = self.ready.clone();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProcessError::Cancelled),
            result = ready.wait_for(|ready| *ready) => result
                .map(|_| ())
                .map_err(|_| ProcessError::ExitedBeforeReady),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn pending(&self) -> i64 {
        self.state.pending.get()
    }

    /// Whether both output streams have ended
    pub fn has_exited(&self) -> bool {
        self.state.exited.load(Ordering::SeqCst)
    }

    /// Close stdin, kill the process and stop the output tasks
    ///
    /// Every step runs even when an earlier one fails.
    pub async fn close(&self) -> Result<(), ProcessError> {
        let mut errors = Vec::new();

        if let Some(mut stdin) = self.stdin.lock().await.take()
            && let Err(e) = stdin.shutdown().await
        {
            errors.push(format!("failed to close stdin: {}", e));
        }

        {
            let mut child = self.child.lock().await;
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!("Indexer '{}' already exited with {}", self.program, status);
                }
                Ok(None) => {
                    if let Err(e) = child.kill().await {
                        errors.push(format!("failed to kill process: {}", e));
                    }
                }
                Err(e) => errors.push(format!("failed to query process status: {}", e)),
            }
        }

        for task in &self.tasks {
            task.abort();
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProcessError::CloseFailed(errors))
        }
    }

    pub async fn wait_and_close(&self) -> Result<(), ProcessError> {
        self.wait_for_completion().await;
        self.close().await
    }
}

fn abort_spawn(child: &mut Child, pipe: &'static str) -> ProcessError {
    if let Err(e) = child.start_kill() {
        tracing::warn!("Failed to kill indexer without {} pipe: {}", pipe, e);
    }
    ProcessError::MissingPipe(pipe)
}

fn spawn_reader<R>(
    reader: R,
    stream: &'static str,
    lines: mpsc::Sender<String>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader).lines();
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = reader.next_line() => next,
            };
            match next {
                Ok(Some(line)) if line.is_empty() => continue,
                Ok(Some(line)) => {
                    if lines.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Error reading indexer {}: {}", stream, e);
                    break;
                }
            }
        }
    })
}

/// Relay lines to the public output and drive the protocol state
async fn forward_output(
    mut lines: mpsc::Receiver<String>,
    output: mpsc::Sender<String>,
    ready: watch::Sender<bool>,
    state: Arc<ProtocolState>,
    cancel: CancellationToken,
) {
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        let kind = classify(&line);

        if !output.is_closed() {
            tokio::select! {
                _ = cancel.cancelled() => return,
                // A dropped receiver only stops the relaying
                _ = output.send(line) => {}
            }
        }

        match kind {
            LineKind::Ready => {
                // Counted before waking readiness waiters, whose first write
                // must not be the one this line cancels out
                state.status_received();
                let first = ready.send_if_modified(|ready| !std::mem::replace(ready, true));
                if first {
                    tracing::debug!("Indexer reported ready");
                }
            }
            LineKind::Status => state.status_received(),
            LineKind::Output => {}
        }
    }

    state.mark_exited();
}
