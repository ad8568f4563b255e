/// Configuration system for code-memory
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, IndexerError};
use crate::indexer::DEFAULT_SKIP_DIRS;
use crate::paths::PlatformPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// External indexer process configuration
    #[serde(default)]
    pub indexer: IndexerConfig,

    /// Source discovery and batching configuration
    #[serde(default)]
    pub indexing: IndexingConfig,
}

/// External indexer process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Directory holding `lib/` (script assets) and `chroma/` (vector store).
    /// A leading `~` is expanded.
    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,

    /// Program launched in `<working_directory>/lib`
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments before the appended `--db-path <working_directory>/chroma`
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Number of indexer processes
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Wait for every process to report READY before sending work
    #[serde(default = "default_wait_ready")]
    pub wait_ready: bool,

    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,

    /// Upper bound on waiting for outstanding batches at shutdown
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

/// Source discovery and batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Maximum number of chunks per request line
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum file size to index (in bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    /// Directory names never descended into
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,

    #[serde(default = "default_respect_gitignore")]
    pub respect_gitignore: bool,
}

// Default value functions
fn default_working_directory() -> PathBuf {
    PlatformPaths::default_working_dir()
}

fn default_program() -> String {
    "uv".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "run".to_string(),
        "python".to_string(),
        "indexer.py".to_string(),
    ]
}

fn default_workers() -> usize {
    4
}

fn default_wait_ready() -> bool {
    true
}

fn default_ready_timeout() -> u64 {
    300
}

fn default_drain_timeout() -> u64 {
    600
}

fn default_batch_size() -> usize {
    64
}

fn default_max_file_size() -> usize {
    1_048_576 // 1 MB
}

fn default_skip_dirs() -> Vec<String> {
    DEFAULT_SKIP_DIRS.iter().map(|d| d.to_string()).collect()
}

fn default_respect_gitignore() -> bool {
    true
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            working_directory: default_working_directory(),
            program: default_program(),
            args: default_args(),
            workers: default_workers(),
            wait_ready: default_wait_ready(),
            ready_timeout_secs: default_ready_timeout(),
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

impl IndexerConfig {
    /// Working directory with `~` expanded
    pub fn working_dir(&self) -> PathBuf {
        PlatformPaths::expand_home(&self.working_directory)
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_file_size: default_max_file_size(),
            skip_dirs: default_skip_dirs(),
            respect_gitignore: default_respect_gitignore(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, IndexerError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, IndexerError> {
        let config_path = PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), IndexerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.indexer.workers == 0 {
            return Err(invalid("indexer.workers", "must be greater than 0"));
        }

        if self.indexer.program.trim().is_empty() {
            return Err(invalid("indexer.program", "must not be empty"));
        }

        if self.indexing.batch_size == 0 {
            return Err(invalid("indexing.batch_size", "must be greater than 0"));
        }

        if self.indexing.max_file_size == 0 {
            return Err(invalid("indexing.max_file_size", "must be greater than 0"));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("CODE_MEMORY_WORKING_DIR") {
            self.indexer.working_directory = PathBuf::from(dir);
        }

        if let Ok(program) = std::env::var("CODE_MEMORY_PROGRAM") {
            self.indexer.program = program;
        }

        if let Ok(workers) = std::env::var("CODE_MEMORY_WORKERS")
            && let Ok(count) = workers.parse()
        {
            self.indexer.workers = count;
        }

        if let Ok(batch_size) = std::env::var("CODE_MEMORY_BATCH_SIZE")
            && let Ok(size) = batch_size.parse()
        {
            self.indexing.batch_size = size;
        }
    }

    /// Load from `path` (or the default location), then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, IndexerError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::load_or_default()?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

fn invalid(key: &str, reason: &str) -> IndexerError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
