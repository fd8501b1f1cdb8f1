use std::path::{Path, PathBuf};

use thiserror::Error;

/// Startup validation failures for the served root. These are the only
/// process-fatal errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("root directory does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("root is not a directory: {0}")]
    RootNotADirectory(PathBuf),

    #[error("root directory cannot be resolved: {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration for file system access
#[derive(Debug, Clone)]
pub struct FileSystemConfig {
    /// Canonical root directory; nothing outside it is ever read, listed or deleted
    pub root: PathBuf,

    /// Files larger than this are not previewed (bytes)
    pub max_preview_size: u64,

    /// Maximum file size for raw read operations (bytes)
    pub max_read_size: u64,

    /// Maximum entries in a directory listing before truncation
    pub max_list_entries: usize,

    /// Maximum search results
    pub max_search_results: u32,

    /// Refuse destructive operations
    pub read_only: bool,
}

impl FileSystemConfig {
    /// Build a config for `root`, which must exist and be a directory.
    ///
    /// The stored root is canonical so every containment check compares
    /// symlink-resolved paths.
    pub fn for_root(root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let root = root.as_ref();
        let canonical = root.canonicalize().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::RootMissing(root.to_path_buf())
            } else {
                ConfigError::RootUnreadable {
                    path: root.to_path_buf(),
                    source: e,
                }
            }
        })?;

        if !canonical.is_dir() {
            return Err(ConfigError::RootNotADirectory(canonical));
        }

        Ok(Self {
            root: canonical,
            max_preview_size: 50 * 1024 * 1024,
            max_read_size: 50 * 1024 * 1024,
            max_list_entries: 10_000,
            max_search_results: 1_000,
            read_only: false,
        })
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}
