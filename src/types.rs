use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of construct a chunk represents
///
/// Serialized as the plural, lowercase query name (`"functions"`, `"methods"`, ...).
/// `Methods` has no query of its own: it is produced by re-tagging a function
/// found inside a class scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Functions,
    Methods,
    Classes,
    Variables,
    Imports,
    Types,
    Interfaces,
    Structs,
    Enums,
    Traits,
    Impls,
    Constants,
    Statics,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Functions => "functions",
            ChunkKind::Methods => "methods",
            ChunkKind::Classes => "classes",
            ChunkKind::Variables => "variables",
            ChunkKind::Imports => "imports",
            ChunkKind::Types => "types",
            ChunkKind::Interfaces => "interfaces",
            ChunkKind::Structs => "structs",
            ChunkKind::Enums => "enums",
            ChunkKind::Traits => "traits",
            ChunkKind::Impls => "impls",
            ChunkKind::Constants => "constants",
            ChunkKind::Statics => "statics",
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata sent along with every chunk to the indexer process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the file the chunk was extracted from, as given to the extractor
    pub file_path: String,
    /// Function, method or variable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Enclosing class for methods, own name for classes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Starting line number, 1-based
    pub start_line: usize,
    /// Ending line number, 1-based and inclusive
    pub end_line: usize,
    /// Canonical language name (e.g. "python")
    pub language: String,
    pub chunk_type: ChunkKind,
}

/// Summary of one indexing run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexResponse {
    /// Number of files read and handed to the extractor
    pub files_indexed: usize,
    /// Number of files skipped (too large, unreadable, unsupported or unparsable)
    pub files_skipped: usize,
    /// Number of code chunks extracted
    pub chunks_created: usize,
    /// Number of per-file chunk batches accepted by the worker pool
    pub batches_submitted: usize,
    /// Time taken in milliseconds
    pub duration_ms: u64,
    /// Any errors encountered (non-fatal)
    #[serde(default)]
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests;
