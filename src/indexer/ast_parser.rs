use super::CodeChunk;
use super::language::{LanguageConfig, LanguageRegistry};
use crate::error::ChunkingError;
use crate::types::{ChunkKind, ChunkMetadata};
use std::collections::HashMap;
use tree_sitter::{Node, Parser, Query, QueryCursor, QueryMatch, StreamingIterator};

/// What a query capture contributes to a chunk, resolved once per capture name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRole {
    /// The node whose span becomes the chunk
    Anchor,
    /// Function, variable or type name
    Name,
    /// Name of a class definition
    ClassName,
    Ignored,
}

impl CaptureRole {
    /// Classify a capture by the naming convention used in the registry queries
    pub fn from_capture_name(name: &str) -> Self {
        if name == "import"
            || name.ends_with(".definition")
            || name.ends_with(".declaration")
            || name.ends_with(".assignment")
        {
            CaptureRole::Anchor
        } else if name == "class.name" {
            CaptureRole::ClassName
        } else if name.ends_with(".name") {
            CaptureRole::Name
        } else {
            CaptureRole::Ignored
        }
    }
}

/// A registry query compiled against its grammar
struct PreparedQuery {
    kind: ChunkKind,
    /// `None` when the query failed to compile; it is skipped on every file
    query: Option<Query>,
    roles: Vec<CaptureRole>,
}

struct PreparedLanguage {
    config: LanguageConfig,
    queries: Vec<PreparedQuery>,
}

/// Extracts functions, methods, classes, variables, ... from source files
///
/// Queries are compiled once at construction; a query that does not compile is
/// logged and skipped so it never blocks a file.
pub struct ChunkExtractor {
    languages: Vec<PreparedLanguage>,
}

impl ChunkExtractor {
    pub fn new(registry: LanguageRegistry) -> Self {
        let languages = registry
            .languages()
            .iter()
            .cloned()
            .map(|config| {
                let queries = config
                    .queries
                    .iter()
                    .map(|(kind, source)| prepare_query(&config, *kind, source))
                    .collect();
                PreparedLanguage { config, queries }
            })
            .collect();

        Self { languages }
    }

    /// Registered extensions, without the leading dot
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .languages
            .iter()
            .flat_map(|lang| lang.config.extensions.iter())
            .map(|ext| ext.trim_start_matches('.').to_string())
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }

    /// Language name for a path, if any registered language claims it
    pub fn language_for(&self, file_path: &str) -> Option<&str> {
        self.detect(file_path).map(|lang| lang.config.name)
    }

    /// Parse a source file and return its chunks
    ///
    /// Chunks are grouped by query category in registry order; within a category
    /// they keep match order.
    pub fn parse_file(
        &self,
        file_path: &str,
        source: &[u8],
    ) -> Result<Vec<CodeChunk>, ChunkingError> {
        let lang = self
            .detect(file_path)
            .ok_or_else(|| ChunkingError::UnsupportedFileType(file_path.to_string()))?;

        let mut parser = Parser::new();
        parser
            .set_language(&lang.config.language)
            .map_err(|e| ChunkingError::ParseFailed {
                file: file_path.to_string(),
                reason: e.to_string(),
            })?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ChunkingError::ParseFailed {
                file: file_path.to_string(),
                reason: "parser produced no syntax tree".to_string(),
            })?;
        let root = tree.root_node();

        let mut ids = IdAllocator::default();
        let mut chunks = Vec::new();

        for prepared in &lang.queries {
            let Some(query) = &prepared.query else {
                tracing::debug!(
                    "Skipping {} query for {}: it failed to compile",
                    prepared.kind,
                    file_path
                );
                continue;
            };

            let mut cursor = QueryCursor::new();
            let mut matches = cursor.matches(query, root, source);
            while let Some(query_match) = matches.next() {
                if let Some(chunk) =
                    build_chunk(query_match, prepared, lang, source, file_path, &mut ids)
                {
                    chunks.push(chunk);
                }
            }
        }

        Ok(chunks)
    }

    fn detect(&self, file_path: &str) -> Option<&PreparedLanguage> {
        self.languages
            .iter()
            .find(|lang| lang.config.matches_path(file_path))
    }
}

impl Default for ChunkExtractor {
    fn default() -> Self {
        Self::new(LanguageRegistry::builtin())
    }
}

fn prepare_query(config: &LanguageConfig, kind: ChunkKind, source: &str) -> PreparedQuery {
    match Query::new(&config.language, source) {
        Ok(query) => {
            let roles = query
                .capture_names()
                .iter()
                .map(|name| CaptureRole::from_capture_name(name))
                .collect();
            PreparedQuery {
                kind,
                query: Some(query),
                roles,
            }
        }
        Err(e) => {
            let err = ChunkingError::QueryFailed {
                kind: format!("{}/{}", config.name, kind),
                reason: e.to_string(),
            };
            tracing::warn!("{}", err);
            PreparedQuery {
                kind,
                query: None,
                roles: Vec::new(),
            }
        }
    }
}

/// Hands out `<path>_<label>_<line>` ids, suffixing repeats within one file
#[derive(Default)]
struct IdAllocator {
    seen: HashMap<String, usize>,
}

impl IdAllocator {
    fn allocate(&mut self, file_path: &str, label: &str, start_line: usize) -> String {
        let base = format!("{}_{}_{}", file_path, label, start_line);
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{}_{}", base, count)
        }
    }
}

fn build_chunk(
    query_match: &QueryMatch,
    prepared: &PreparedQuery,
    lang: &PreparedLanguage,
    source: &[u8],
    file_path: &str,
    ids: &mut IdAllocator,
) -> Option<CodeChunk> {
    let mut anchor: Option<Node> = None;
    let mut name: Option<String> = None;
    let mut class_name: Option<String> = None;

    for capture in query_match.captures {
        match prepared.roles.get(capture.index as usize) {
            Some(CaptureRole::Anchor) => {
                anchor.get_or_insert(capture.node);
            }
            Some(CaptureRole::Name) => name = non_empty(node_text(capture.node, source)),
            Some(CaptureRole::ClassName) => {
                class_name = non_empty(node_text(capture.node, source))
            }
            Some(CaptureRole::Ignored) | None => {}
        }
    }

    let anchor = anchor?;
    let start_line = anchor.start_position().row + 1; // Tree-sitter uses 0-indexed rows
    let end_line = anchor.end_position().row + 1;

    let label = name
        .as_deref()
        .or(class_name.as_deref())
        .unwrap_or(prepared.kind.as_str())
        .to_string();
    let id = ids.allocate(file_path, &label, start_line);

    let mut chunk_type = prepared.kind;
    let mut function_name = name;
    match chunk_type {
        ChunkKind::Functions => {
            if let Some(scope) = enclosing_class(anchor, &lang.config, source) {
                chunk_type = ChunkKind::Methods;
                class_name = scope;
            }
        }
        ChunkKind::Classes => {
            if class_name.is_none() {
                class_name = function_name.take();
            } else {
                function_name = None;
            }
        }
        _ => {}
    }

    Some(CodeChunk {
        id,
        content: node_text(anchor, source),
        metadata: ChunkMetadata {
            file_path: file_path.to_string(),
            function_name,
            class_name,
            start_line,
            end_line,
            language: lang.config.name.to_string(),
            chunk_type,
        },
    })
}

/// Walk up to the innermost class scope
///
/// Returns `None` when the node is not inside a class, `Some(None)` when the
/// enclosing class has no name (e.g. an anonymous class expression).
fn enclosing_class(node: Node, config: &LanguageConfig, source: &[u8]) -> Option<Option<String>> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if let Some(scope) = config.class_scope(parent.kind()) {
            return Some(
                parent
                    .child_by_field_name(scope.name_field)
                    .map(|name| node_text(name, source))
                    .and_then(non_empty),
            );
        }
        current = parent.parent();
    }
    None
}

fn node_text(node: Node, source: &[u8]) -> String {
    String::from_utf8_lossy(&source[node.byte_range()]).into_owned()
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}
