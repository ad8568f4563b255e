//! Tests for the wire types

use super::*;

fn metadata(function_name: Option<&str>, class_name: Option<&str>) -> ChunkMetadata {
    ChunkMetadata {
        file_path: "src/tax.py".to_string(),
        function_name: function_name.map(String::from),
        class_name: class_name.map(String::from),
        start_line: 8,
        end_line: 9,
        language: "python".to_string(),
        chunk_type: ChunkKind::Methods,
    }
}

#[test]
fn test_chunk_kind_serializes_as_query_name() {
    assert_eq!(
        serde_json::to_string(&ChunkKind::Functions).unwrap(),
        "\"functions\""
    );
    assert_eq!(
        serde_json::to_string(&ChunkKind::Methods).unwrap(),
        "\"methods\""
    );
    assert_eq!(
        serde_json::to_string(&ChunkKind::Statics).unwrap(),
        "\"statics\""
    );
}

#[test]
fn test_chunk_kind_display_matches_serde() {
    for kind in [
        ChunkKind::Functions,
        ChunkKind::Methods,
        ChunkKind::Classes,
        ChunkKind::Variables,
        ChunkKind::Imports,
        ChunkKind::Types,
        ChunkKind::Interfaces,
        ChunkKind::Structs,
        ChunkKind::Enums,
        ChunkKind::Traits,
        ChunkKind::Impls,
        ChunkKind::Constants,
        ChunkKind::Statics,
    ] {
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, format!("\"{}\"", kind));
    }
}

#[test]
fn test_metadata_wire_field_names() {
    let json = serde_json::to_value(metadata(Some("__init__"), Some("TaxCalculator"))).unwrap();

    assert_eq!(json["file_path"], "src/tax.py");
    assert_eq!(json["function_name"], "__init__");
    assert_eq!(json["class_name"], "TaxCalculator");
    assert_eq!(json["start_line"], 8);
    assert_eq!(json["end_line"], 9);
    assert_eq!(json["language"], "python");
    assert_eq!(json["chunk_type"], "methods");
}

#[test]
fn test_metadata_omits_empty_optional_fields() {
    let json = serde_json::to_string(&metadata(None, None)).unwrap();

    assert!(!json.contains("function_name"));
    assert!(!json.contains("class_name"));
}

#[test]
fn test_metadata_deserializes_without_optional_fields() {
    let json = r#"{
        "file_path": "main.go",
        "start_line": 1,
        "end_line": 3,
        "language": "go",
        "chunk_type": "functions"
    }"#;

    let meta: ChunkMetadata = serde_json::from_str(json).unwrap();
    assert_eq!(meta.function_name, None);
    assert_eq!(meta.class_name, None);
    assert_eq!(meta.chunk_type, ChunkKind::Functions);
}

#[test]
fn test_index_response_default() {
    let response = IndexResponse::default();
    assert_eq!(response.files_indexed, 0);
    assert_eq!(response.batches_submitted, 0);
    assert!(response.errors.is_empty());
}

#[test]
fn test_index_response_errors_default_when_missing() {
    let json = r#"{
        "files_indexed": 2,
        "files_skipped": 1,
        "chunks_created": 7,
        "batches_submitted": 2,
        "duration_ms": 15
    }"#;

    let response: IndexResponse = serde_json::from_str(json).unwrap();
    assert_eq!(response.chunks_created, 7);
    assert!(response.errors.is_empty());
}
