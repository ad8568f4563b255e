//! End-to-end runs of the indexing pipeline against shell stand-ins for the
//! Python indexer
#![cfg(unix)]

use anyhow::Result;
use code_memory::Config;
use code_memory::IndexClient;
use code_memory::embedding::{CHROMA_DIR, LIB_DIR};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Reports ready, then acknowledges every request and appends it to the
/// database path given after `--db-path`
const RECORDING_INDEXER: &str = r#"
mkdir -p "$2"
echo '{"status": "READY"}'
while IFS= read -r line; do
  printf '%s\n' "$line" >> "$2/requests.jsonl"
  echo '{"status": "success", "indexed_count": 1}'
done
"#;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn shell_config(working_dir: &Path, script: &str, workers: usize) -> Config {
    let mut config = Config::default();
    config.indexer.working_directory = working_dir.to_path_buf();
    config.indexer.program = "sh".to_string();
    // `sh -c script name --db-path <dir>` binds $1 to --db-path and $2 to <dir>
    config.indexer.args = vec!["-c".to_string(), script.to_string(), "indexer".to_string()];
    config.indexer.workers = workers;
    config.indexer.ready_timeout_secs = 10;
    config.indexer.drain_timeout_secs = 10;
    config
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tax.py",
        r#"def calculate_tax(amount):
    return amount * 0.2

class TaxCalculator:
    def calculate(self, amount):
        return calculate_tax(amount)
"#,
    );
    write(
        dir.path(),
        "cmd/main.go",
        "package main\n\nfunc main() {\n}\n",
    );
    write(
        dir.path(),
        "web/app.ts",
        "export function render(): string {\n  return \"ok\";\n}\n",
    );
    write(dir.path(), "README.md", "# not indexed\n");
    write(dir.path(), ".git/hooks/pre-commit.py", "def hook():\n    pass\n");
    dir
}

fn recorded_chunks(working_dir: &Path) -> Vec<serde_json::Value> {
    let requests =
        std::fs::read_to_string(working_dir.join(CHROMA_DIR).join("requests.jsonl")).unwrap();
    let mut chunks = Vec::new();
    for line in requests.lines() {
        let request: serde_json::Value = serde_json::from_str(line).unwrap();
        chunks.extend(request["chunks"].as_array().unwrap().iter().cloned());
    }
    chunks
}

fn recorded_ids(working_dir: &Path) -> Vec<String> {
    recorded_chunks(working_dir)
        .iter()
        .map(|chunk| chunk["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_index_directory_end_to_end() -> Result<()> {
    let source = project();
    let working_dir = TempDir::new()?;
    let client = IndexClient::new(shell_config(working_dir.path(), RECORDING_INDEXER, 3));

    let response = tokio::time::timeout(
        TIMEOUT,
        client.index_directory(source.path(), CancellationToken::new()),
    )
    .await??;

    assert_eq!(response.files_indexed, 3);
    assert!(response.errors.is_empty(), "{:?}", response.errors);

    // Every extracted chunk reached an indexer exactly once
    let mut ids = recorded_ids(working_dir.path());
    assert_eq!(ids.len(), response.chunks_created);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), response.chunks_created);

    assert!(ids.iter().any(|id| id.ends_with("tax.py_calculate_tax_1")));
    assert!(ids.iter().any(|id| id.ends_with("tax.py_calculate_5")));
    assert!(!ids.iter().any(|id| id.contains("pre-commit")));

    // Escaped characters in chunk content arrive intact
    let render = recorded_chunks(working_dir.path())
        .into_iter()
        .find(|chunk| chunk["metadata"]["function_name"] == "render")
        .expect("render chunk was not recorded");
    assert!(render["content"].as_str().unwrap().contains(r#"return "ok";"#));

    // Assets were staged next to the database
    assert!(working_dir.path().join(LIB_DIR).join("indexer.py").exists());
    Ok(())
}

#[tokio::test]
async fn test_small_batches_split_requests() -> Result<()> {
    let source = project();
    let working_dir = TempDir::new()?;
    let mut config = shell_config(working_dir.path(), RECORDING_INDEXER, 1);
    config.indexing.batch_size = 1;
    let client = IndexClient::new(config);

    let response = client
        .index_directory(source.path(), CancellationToken::new())
        .await?;

    let requests =
        std::fs::read_to_string(working_dir.path().join(CHROMA_DIR).join("requests.jsonl"))?;
    assert_eq!(requests.lines().count(), response.chunks_created);
    Ok(())
}

#[tokio::test]
async fn test_indexer_that_never_starts_fails_the_run() -> Result<()> {
    let source = project();
    let working_dir = TempDir::new()?;
    let client = IndexClient::new(shell_config(working_dir.path(), "exit 3", 2));

    let err = tokio::time::timeout(
        TIMEOUT,
        client.index_directory(source.path(), CancellationToken::new()),
    )
    .await?
    .unwrap_err();

    assert!(format!("{:#}", err).contains("failed to start"));
    Ok(())
}

#[tokio::test]
async fn test_rejected_batches_do_not_fail_the_run() -> Result<()> {
    let script = r#"
echo '{"status": "READY"}'
while IFS= read -r line; do
  echo '{"status": "error", "message": "embedding model crashed"}'
done
"#;
    let source = project();
    let working_dir = TempDir::new()?;
    let client = IndexClient::new(shell_config(working_dir.path(), script, 2));

    let response = tokio::time::timeout(
        TIMEOUT,
        client.index_directory(source.path(), CancellationToken::new()),
    )
    .await??;

    assert_eq!(response.files_indexed, 3);
    assert!(response.batches_submitted > 0);
    Ok(())
}

#[tokio::test]
async fn test_cancellation_stops_a_stuck_run() -> Result<()> {
    // Ready, but never acknowledges anything
    let script = r#"echo '{"status": "READY"}'; cat > /dev/null"#;
    let source = project();
    let working_dir = TempDir::new()?;
    let client = IndexClient::new(shell_config(working_dir.path(), script, 1));

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let err = tokio::time::timeout(TIMEOUT, client.index_directory(source.path(), cancel))
        .await?
        .unwrap_err();
    assert!(err.to_string().contains("cancelled"));
    Ok(())
}

#[tokio::test]
async fn test_cancellation_stops_a_run_blocked_on_a_full_pipe() -> Result<()> {
    // Ready, but never reads its stdin, so writes block once the pipe is full
    let script = r#"echo '{"status": "READY"}'; sleep 60"#;
    let source = TempDir::new()?;
    let mut module = String::new();
    for i in 0..4000 {
        module.push_str(&format!("def function_{i}(value):\n    return value + {i}\n\n"));
    }
    write(source.path(), "big.py", &module);

    let working_dir = TempDir::new()?;
    let client = IndexClient::new(shell_config(working_dir.path(), script, 1));

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        client.index_directory(source.path(), cancel),
    )
    .await
    .expect("index_directory kept running after cancellation")
    .unwrap_err();
    assert!(err.to_string().contains("cancelled"));
    Ok(())
}
