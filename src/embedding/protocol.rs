//! Line protocol spoken with the indexer process
//!
//! Requests are single JSON lines `{"chunks": [...]}`. Responses are free text;
//! a line is a status line when it contains `status`, and a readiness line
//! when it also contains `READY`.

use crate::error::ProcessError;
use crate::indexer::CodeChunk;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// One batch of chunks, serialized as a single request line
#[derive(Debug, Serialize)]
pub struct IndexRequest<'a> {
    pub chunks: &'a [CodeChunk],
}

impl<'a> IndexRequest<'a> {
    pub fn new(chunks: &'a [CodeChunk]) -> Self {
        Self { chunks }
    }

    /// Serialize to one newline-terminated line
    pub fn to_line(&self) -> Result<String, ProcessError> {
        let mut line =
            serde_json::to_string(self).map_err(|e| ProcessError::Serialization(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }
}

/// Status reply printed by the bundled script, when it is valid JSON
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexStatus {
    pub status: String,
    #[serde(default)]
    pub indexed_count: Option<usize>,
    #[serde(default)]
    pub message: Option<String>,
}

impl IndexStatus {
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line).ok()
    }

    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case("error")
    }
}

/// How the supervisor reacts to one output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Status line announcing readiness; also counts as a status line
    Ready,
    Status,
    /// Anything else (logs, progress bars, tracebacks)
    Output,
}

pub fn classify(line: &str) -> LineKind {
    if !line.contains("status") {
        LineKind::Output
    } else if line.contains("READY") {
        LineKind::Ready
    } else {
        LineKind::Status
    }
}

/// Outstanding batches for one process: +1 per write, -1 per status line
///
/// Never reads below zero. The process answers one line per request, but
/// the readiness line is a status line too, so the count is a liveness
/// signal rather than an exact ledger.
#[derive(Debug, Default)]
pub struct PendingCounter {
    value: AtomicI64,
}

impl PendingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) -> i64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrement and return the new value, clamped at zero
    pub fn decrement(&self) -> i64 {
        let value = self.value.fetch_sub(1, Ordering::SeqCst) - 1;
        if value < 0 {
            // Only reset if nobody incremented in between
            let _ = self
                .value
                .compare_exchange(value, 0, Ordering::SeqCst, Ordering::SeqCst);
            return 0;
        }
        value
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkKind, ChunkMetadata};

    fn chunk(id: &str, class_name: Option<&str>) -> CodeChunk {
        CodeChunk {
            id: id.to_string(),
            content: "def run(self):\n    pass".to_string(),
            metadata: ChunkMetadata {
                file_path: "jobs.py".to_string(),
                function_name: Some("run".to_string()),
                class_name: class_name.map(String::from),
                start_line: 3,
                end_line: 4,
                language: "python".to_string(),
                chunk_type: ChunkKind::Methods,
            },
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(r#"{"status": "READY"}"#), LineKind::Ready);
        assert_eq!(
            classify(r#"{"status": "success", "indexed_count": 3}"#),
            LineKind::Status
        );
        assert_eq!(
            classify(r#"{"status": "error", "message": "boom"}"#),
            LineKind::Status
        );
        assert_eq!(classify("Loading model all-MiniLM-L6-v2..."), LineKind::Output);
        assert_eq!(classify("READY but no keyword"), LineKind::Output);
    }

    #[test]
    fn test_request_line_format() {
        let chunks = vec![chunk("jobs.py_run_3", Some("Job"))];
        let line = IndexRequest::new(&chunks).to_line().unwrap();

        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        let first = &value["chunks"][0];
        assert_eq!(first["id"], "jobs.py_run_3");
        assert_eq!(first["content"], "def run(self):\n    pass");
        assert_eq!(first["metadata"]["class_name"], "Job");
        assert_eq!(first["metadata"]["chunk_type"], "methods");
        assert_eq!(first["metadata"]["start_line"], 3);
    }

    #[test]
    fn test_request_omits_absent_class_name() {
        let chunks = vec![chunk("jobs.py_run_3", None)];
        let line = IndexRequest::new(&chunks).to_line().unwrap();
        assert!(!line.contains("class_name"));
    }

    #[test]
    fn test_index_status_parse() {
        let status = IndexStatus::parse(r#"{"status": "success", "indexed_count": 12}"#).unwrap();
        assert_eq!(status.indexed_count, Some(12));
        assert!(!status.is_error());

        let status = IndexStatus::parse(r#"{"status": "error", "message": "No chunks provided"}"#)
            .unwrap();
        assert!(status.is_error());
        assert_eq!(status.message.as_deref(), Some("No chunks provided"));

        assert!(IndexStatus::parse("status: fine").is_none());
    }

    #[test]
    fn test_counter_clamps_at_zero() {
        let counter = PendingCounter::new();
        assert_eq!(counter.decrement(), 0);
        assert_eq!(counter.get(), 0);

        counter.increment();
        counter.increment();
        assert_eq!(counter.decrement(), 1);
        assert_eq!(counter.decrement(), 0);
        assert_eq!(counter.decrement(), 0);
        assert_eq!(counter.get(), 0);

        assert_eq!(counter.increment(), 1);
    }
}
