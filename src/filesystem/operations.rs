use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::protocol::{ContentType, Entry, EntryKind, EntryMetadata, FileSystemError, ListingItem};

use super::config::FileSystemConfig;
use super::mime;
use super::path_utils;
use super::security::{self, PathResolver, ResolvedPath};

/// Raw contents of a resolved file
#[derive(Debug, Clone)]
pub struct RawFile {
    pub content_type: ContentType,
    pub size: u64,
    pub data: Vec<u8>,
}

#[derive(Clone)]
pub struct FileOperations {
    resolver: Arc<PathResolver>,
    config: Arc<FileSystemConfig>,
}

impl FileOperations {
    pub fn new(resolver: Arc<PathResolver>, config: Arc<FileSystemConfig>) -> Self {
        Self { resolver, config }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn config(&self) -> &FileSystemConfig {
        &self.config
    }

    /// List the immediate children of a directory, sorted by name.
    ///
    /// Returns the (possibly truncated) entries, the total count and whether
    /// truncation happened. Metadata is fetched separately via `stat_entry`.
    pub async fn list_directory(
        &self,
        dir: &ResolvedPath,
    ) -> Result<(Vec<Entry>, usize, bool), FileSystemError> {
        let metadata = fs::metadata(dir.absolute())
            .await
            .map_err(|e| io_error(dir.requested(), e))?;
        if !metadata.is_dir() {
            return Err(FileSystemError::NotADirectory {
                path: dir.requested().to_string(),
            });
        }

        let mut read_dir = fs::read_dir(dir.absolute())
            .await
            .map_err(|e| io_error(dir.requested(), e))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| io_error(dir.requested(), e))?
        {
            let entry_path = entry.path();
            let kind = entry_kind(self.resolver.root(), &entry_path, entry.file_type().await.ok());
            entries.push(Entry {
                kind,
                name: entry.file_name().to_string_lossy().to_string(),
                relative_path: path_utils::to_protocol_path(self.resolver.root(), &entry_path),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let total_count = entries.len();
        let truncated = total_count > self.config.max_list_entries;
        if truncated {
            entries.truncate(self.config.max_list_entries);
        }

        Ok((entries, total_count, truncated))
    }

    /// Metadata for a listed entry. Never fails: an entry that vanished or
    /// cannot be stat'ed gets the `Unknown` sentinel.
    pub async fn stat_entry(&self, entry: &Entry) -> EntryMetadata {
        let resolved = match self.resolver.resolve_existing(&entry.relative_path) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!("Stat skipped for {}: {}", entry.relative_path, e);
                return EntryMetadata::unknown();
            }
        };

        match self.stat(&resolved).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!("Stat failed for {}: {}", entry.relative_path, e);
                EntryMetadata::unknown()
            }
        }
    }

    /// Pair each entry with its metadata
    pub async fn with_metadata(&self, entries: Vec<Entry>) -> Vec<ListingItem> {
        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let metadata = self.stat_entry(&entry).await;
            items.push(ListingItem { entry, metadata });
        }
        items
    }

    /// Stat a resolved path
    pub async fn stat(&self, resolved: &ResolvedPath) -> Result<EntryMetadata, FileSystemError> {
        let metadata = fs::metadata(resolved.absolute())
            .await
            .map_err(|e| io_error(resolved.requested(), e))?;

        let is_directory = metadata.is_dir();
        let modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH));

        Ok(EntryMetadata {
            size_bytes: if is_directory { 0 } else { metadata.len() },
            modified_at,
            kind_label: mime::kind_label(&requested_name(resolved), is_directory),
        })
    }

    /// Classify a resolved file. The probe runs on the blocking pool.
    pub async fn classify(&self, resolved: &ResolvedPath) -> ContentType {
        let path = resolved.absolute().to_path_buf();
        tokio::task::spawn_blocking(move || mime::classify(&path))
            .await
            .unwrap_or_else(|e| {
                tracing::debug!("Classification task failed: {}", e);
                ContentType::octet_stream()
            })
    }

    pub async fn classify_file(&self, resolved: &ResolvedPath) -> Result<ContentType, FileSystemError> {
        let metadata = fs::metadata(resolved.absolute())
            .await
            .map_err(|e| io_error(resolved.requested(), e))?;
        if !metadata.is_file() {
            return Err(FileSystemError::NotAFile {
                path: resolved.requested().to_string(),
            });
        }
        Ok(self.classify(resolved).await)
    }

    /// Read a whole file into memory
    pub async fn read_file(&self, resolved: &ResolvedPath) -> Result<RawFile, FileSystemError> {
        let metadata = fs::metadata(resolved.absolute())
            .await
            .map_err(|e| io_error(resolved.requested(), e))?;

        if !metadata.is_file() {
            return Err(FileSystemError::NotAFile {
                path: resolved.requested().to_string(),
            });
        }

        let size = metadata.len();
        if size > self.config.max_read_size {
            return Err(FileSystemError::FileTooLarge {
                path: resolved.requested().to_string(),
                size,
                max_size: self.config.max_read_size,
            });
        }

        let content_type = self.classify(resolved).await;
        let data = fs::read(resolved.absolute())
            .await
            .map_err(|e| io_error(resolved.requested(), e))?;

        Ok(RawFile {
            content_type,
            size: data.len() as u64,
            data,
        })
    }

    /// Delete a single file entry resolved with `PathResolver::resolve_entry`.
    ///
    /// A symlink is removed itself, never its target. Directories, and links
    /// that list as folders, are refused untouched.
    pub async fn delete_file(&self, resolved: &ResolvedPath) -> Result<(), FileSystemError> {
        if self.config.read_only {
            return Err(FileSystemError::PermissionDenied {
                path: resolved.requested().to_string(),
                reason: "Server is running read-only".to_string(),
            });
        }

        let file_type = fs::symlink_metadata(resolved.absolute())
            .await
            .map_err(|e| io_error(resolved.requested(), e))?
            .file_type();

        let deletable = file_type.is_file()
            || (file_type.is_symlink()
                && !security::link_targets_dir_within(self.resolver.root(), resolved.absolute()));
        if !deletable {
            return Err(FileSystemError::NotAFile {
                path: resolved.requested().to_string(),
            });
        }

        fs::remove_file(resolved.absolute())
            .await
            .map_err(|e| io_error(resolved.requested(), e))?;

        tracing::info!("Deleted {}", resolved.relative());
        Ok(())
    }
}

/// Map an I/O error on a client-requested path. A path that disappeared after
/// resolution reports `NotFound`.
pub(crate) fn io_error(path: &str, err: std::io::Error) -> FileSystemError {
    match err.kind() {
        std::io::ErrorKind::NotFound => FileSystemError::NotFound {
            path: path.to_string(),
        },
        std::io::ErrorKind::PermissionDenied => FileSystemError::PermissionDenied {
            path: path.to_string(),
            reason: err.to_string(),
        },
        _ => FileSystemError::read_failure(path, err),
    }
}

/// Name the client asked for, falling back to the resolved target's name
pub(crate) fn requested_name(resolved: &ResolvedPath) -> String {
    Path::new(resolved.requested())
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_utils::display_name(resolved.absolute()))
}

/// Folder or file. A symlink is a folder only when it points at a directory
/// inside the root.
fn entry_kind(root: &Path, path: &Path, file_type: Option<std::fs::FileType>) -> EntryKind {
    let is_dir = match file_type {
        Some(ft) if ft.is_dir() => true,
        Some(ft) if !ft.is_symlink() => false,
        _ => security::link_targets_dir_within(root, path),
    };

    if is_dir {
        EntryKind::Folder
    } else {
        EntryKind::File
    }
}
