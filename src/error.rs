/// Centralized error types for code-memory using thiserror
///
/// Provides domain-specific error types so callers can tell a skipped file from a
/// broken worker process or a cancelled run.
use thiserror::Error;

/// Main error type for the indexing pipeline
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("Indexer process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Worker pool error: {0}")]
    Pool(#[from] WorkerPoolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors related to chunk extraction
#[derive(Error, Debug)]
pub enum ChunkingError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("failed to parse file '{file}': {reason}")]
    ParseFailed { file: String, reason: String },

    #[error("query '{kind}' failed: {reason}")]
    QueryFailed { kind: String, reason: String },
}

/// Errors related to the external indexer process
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to prepare working directory '{path}': {reason}")]
    WorkingDirectory { path: String, reason: String },

    #[error("Failed to spawn '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Indexer process has no {0} pipe")]
    MissingPipe(&'static str),

    #[error("Failed to serialize chunks: {0}")]
    Serialization(String),

    #[error("Failed to write chunks to stdin: {0}")]
    WriteFailed(String),

    #[error("Indexer process exited before it was ready")]
    ExitedBeforeReady,

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Failed to close indexer process: {}", .0.join("; "))]
    CloseFailed(Vec<String>),
}

/// Errors related to the worker pool
#[derive(Error, Debug)]
pub enum WorkerPoolError {
    #[error("Worker pool size must be greater than 0")]
    InvalidSize,

    #[error("Failed to create worker {index}: {reason}")]
    CreationFailed { index: usize, reason: String },

    #[error("Submission was cancelled")]
    Cancelled,

    #[error("No worker is accepting work anymore")]
    Closed,

    #[error("Workers failed to become ready: {}", .0.join("; "))]
    NotReady(Vec<String>),

    #[error("Workers failed to shut down: {}", .0.join("; "))]
    ShutdownFailed(Vec<String>),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl IndexerError {
    /// File-level problems only cost the file, not the run
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            IndexerError::Chunking(ChunkingError::UnsupportedFileType(_))
                | IndexerError::Chunking(ChunkingError::ParseFailed { .. })
        )
    }

    /// Check if this error was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            IndexerError::Process(ProcessError::Cancelled)
                | IndexerError::Pool(WorkerPoolError::Cancelled)
        )
    }
}
