/// Centralized platform-specific path computation
///
/// Provides consistent path handling across Windows, macOS, and Linux following
/// XDG Base Directory specification on Unix-like systems.
use std::path::{Path, PathBuf};

const PROJECT_DIR: &str = "code-memory";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get the appropriate config directory for the current platform
    ///
    /// - Windows: %APPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_CONFIG_HOME or ~/.config
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        } else if cfg!(target_os = "macos") {
            Self::home_dir().join("Library/Application Support")
        } else {
            // Linux/Unix - follow XDG Base Directory specification
            std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::home_dir().join(".config"))
        }
    }

    /// Home directory, or "." when it cannot be determined
    pub fn home_dir() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns: {config_dir}/code-memory
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(PROJECT_DIR)
    }

    /// Returns: {config_dir}/code-memory/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }

    /// Where the indexer script and vector store live by default
    ///
    /// Returns: {home}/.code-memory
    pub fn default_working_dir() -> PathBuf {
        Self::home_dir().join(format!(".{}", PROJECT_DIR))
    }

    /// Expand a leading `~` to the home directory
    pub fn expand_home(path: &Path) -> PathBuf {
        match path.strip_prefix("~") {
            Ok(rest) => Self::home_dir().join(rest),
            Err(_) => path.to_path_buf(),
        }
    }
}
