//! Directory traversal for source discovery

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Directory names never descended into
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    ".venv",
    ".git",
    "node_modules",
    "venv",
    "__pycache__",
    ".idea",
    ".vscode",
    "target",
];

pub struct FileWalker {
    pub(crate) root: PathBuf,
    /// Accepted extensions without the leading dot; empty accepts every file
    pub(crate) extensions: Vec<String>,
    pub(crate) skip_dirs: Vec<String>,
    pub(crate) respect_gitignore: bool,
    /// Optional cancellation flag - if set to true, walk() will exit early
    cancelled: Option<Arc<AtomicBool>>,
}

impl FileWalker {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extensions: vec![],
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|d| d.to_string()).collect(),
            respect_gitignore: true,
            cancelled: None,
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .collect();
        self
    }

    pub fn with_skip_dirs(mut self, skip_dirs: Vec<String>) -> Self {
        self.skip_dirs = skip_dirs;
        self
    }

    pub fn with_gitignore(mut self, respect_gitignore: bool) -> Self {
        self.respect_gitignore = respect_gitignore;
        self
    }

    /// Set a cancellation flag that will be checked during the walk.
    /// If the flag is set to true, the walk will exit early.
    pub fn with_cancellation_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(cancelled);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Call `callback` with every eligible file under the root
    ///
    /// Entries are visited in file-name order. Unreadable entries are logged
    /// and skipped; the walk stops at the first callback error. Returns the number of files handed to the callback.
    pub fn walk<F>(&self, mut callback: F) -> Result<usize>
    where
        F: FnMut(&Path) -> Result<()>,
    {
        if !self.root.exists() {
            anyhow::bail!("Root directory does not exist: {:?}", self.root);
        }
        if !self.root.is_dir() {
            anyhow::bail!("Root path is not a directory: {:?}", self.root);
        }

        let skip: HashSet<OsString> = self.skip_dirs.iter().map(OsString::from).collect();

        let walker = WalkBuilder::new(&self.root)
            .standard_filters(self.respect_gitignore) // .gitignore, .ignore, etc.
            .hidden(false) // Hidden files are still source files
            .require_git(false) // Don't require a .git directory
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !(entry.depth() > 0 && is_dir && skip.contains(entry.file_name()))
            })
            .build();

        let mut visited = 0;
        for entry in walker {
            if self.is_cancelled() {
                tracing::info!("File walk cancelled after {} files", visited);
                anyhow::bail!("Walk was cancelled");
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            if !self.matches_extension(path) {
                continue;
            }

            callback(path).with_context(|| format!("Failed to process {:?}", path))?;
            visited += 1;
        }

        tracing::debug!("Visited {} files under {:?}", visited, self.root);
        Ok(visited)
    }

    pub(crate) fn matches_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|wanted| wanted == ext))
    }
}
