//! Source discovery and structural chunking
//!
//! Walks a directory tree for supported source files and extracts functions,
//! methods, classes and other top-level constructs as chunks using tree-sitter.

mod ast_parser;
mod file_walker;
pub mod language;

pub use ast_parser::{CaptureRole, ChunkExtractor};
pub use file_walker::{DEFAULT_SKIP_DIRS, FileWalker};
pub use language::{ClassScope, LanguageConfig, LanguageRegistry};

use crate::types::ChunkMetadata;
use serde::{Deserialize, Serialize};

/// A contiguous span of source text corresponding to one construct
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChunk {
    /// `<file_path>_<name or category>_<start_line>`, unique within a file
    pub id: String,
    /// Exact source text of the construct
    pub content: String,
    pub metadata: ChunkMetadata,
}
