//! # code-memory - AST-based code chunking for external embedding indexers
//!
//! Walks a source tree, splits every supported file into semantic chunks
//! (functions, classes, methods, top-level variables, imports) with tree-sitter,
//! and streams the chunks to a pool of long-running indexer processes that embed
//! them into a vector store.
//!
//! ## Key Features
//!
//! - **AST-Based Chunking**: Tree-sitter queries for Python, Go, Rust, JavaScript and TypeScript
//! - **Deterministic Chunk Ids**: `{file}_{name}_{line}`, stable across runs
//! - **Process Pool**: N indexer processes fed through a rendezvous channel, so
//!   extraction never runs ahead of the slowest consumer
//! - **Line Protocol**: one JSON request per line in, one JSON status per line out
//! - **Staged Assets**: the bundled indexer script is written to the working
//!   directory and refreshed whenever its checksum changes
//!
//! ## Architecture
//!
//! ```text
//! FileWalker ──paths──▶ ChunkExtractor ──Vec<CodeChunk>──▶ WorkerGroup
//!                                                            │ rendezvous
//!                                         ┌──────────────────┼──────────────┐
//!                                   IndexerWorker 0   IndexerWorker 1  ...  N
//!                                         │ stdin/stdout (JSON lines)
//!                                   RunningIndexer ──▶ indexer.py ──▶ chroma/
//! ```
//!
//! ## Modules
//!
//! - [`client`]: Pipeline driver tying the walker, extractor and pool together
//! - [`indexer`]: File walking, language registry and chunk extraction
//! - [`embedding`]: Indexer process management, line protocol and asset staging
//! - [`worker`]: Generic bounded worker pool
//! - [`config`]: Configuration management with environment variable support
//! - [`types`]: Chunk metadata and run summaries
//! - [`error`]: Error types
//! - [`paths`]: Platform-specific default locations
//!
//! ## Usage Example
//!
//! ```no_run
//! use code_memory::{Config, IndexClient};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = IndexClient::new(Config::load_or_default()?);
//!     let response = client
//!         .index_directory(std::path::Path::new("."), CancellationToken::new())
//!         .await?;
//!     println!("{} chunks from {} files", response.chunks_created, response.files_indexed);
//!     Ok(())
//! }
//! ```

/// Pipeline driver: walk, extract, submit
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// External indexer processes and the line protocol they speak
pub mod embedding;

/// Error types and utilities
pub mod error;

/// File walking, language registry, and AST chunk extraction
pub mod indexer;

/// Platform-specific path computation
pub mod paths;

/// Chunk metadata and indexing summaries
pub mod types;

/// Bounded pool of long-lived workers
pub mod worker;

pub use client::IndexClient;
pub use config::Config;
pub use indexer::{ChunkExtractor, CodeChunk};
pub use types::IndexResponse;
