//! Out-of-process embedding
//!
//! Chunks are embedded by an external Python process that speaks a line
//! protocol over stdin/stdout. This module stages the script, spawns and
//! supervises the process, and tracks outstanding batches.

pub mod assets;
pub mod protocol;
mod running_indexer;

pub use assets::{CHROMA_DIR, LIB_DIR, prepare_working_directory};
pub use protocol::{IndexRequest, IndexStatus, LineKind, PendingCounter};
pub use running_indexer::{IndexerCommand, RunningIndexer};
