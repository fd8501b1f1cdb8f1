use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::protocol::{Entry, EntryKind, FileSystemError};

use super::operations::{io_error, FileOperations};
use super::path_utils;
use super::security::{self, ResolvedPath};

#[derive(Clone)]
pub struct FileSearch {
    ops: FileOperations,
}

impl FileSearch {
    pub fn new(ops: FileOperations) -> Self {
        Self { ops }
    }

    /// Recursively collect files and folders under `dir` whose name contains
    /// `term`, ignoring case.
    ///
    /// Paths are relative to the served root, results are sorted by path, and
    /// the boolean reports whether `max_search_results` cut the walk short.
    pub async fn search_files(
        &self,
        dir: &ResolvedPath,
        term: &str,
    ) -> Result<(Vec<Entry>, bool), FileSystemError> {
        let metadata = tokio::fs::metadata(dir.absolute())
            .await
            .map_err(|e| io_error(dir.requested(), e))?;
        if !metadata.is_dir() {
            return Err(FileSystemError::NotADirectory {
                path: dir.requested().to_string(),
            });
        }

        let pattern = Pattern::new(&format!("*{}*", Pattern::escape(&term.to_lowercase())))
            .map_err(|e| FileSystemError::read_failure(dir.requested(), e))?;

        let root = self.ops.resolver().root().to_path_buf();
        let start = dir.absolute().to_path_buf();
        let max_results = self.ops.config().max_search_results as usize;

        let (mut matches, truncated) =
            tokio::task::spawn_blocking(move || walk(&root, &start, &pattern, max_results))
                .await
                .map_err(|e| FileSystemError::read_failure(dir.requested(), e))?
                .map_err(|e| io_error(dir.requested(), e))?;

        matches.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        tracing::debug!(
            "Search for {:?} under {:?}: {} matches{}",
            term,
            dir.relative(),
            matches.len(),
            if truncated { " (truncated)" } else { "" }
        );

        Ok((matches, truncated))
    }
}

/// Worklist walk of `start`. Real subdirectories are always entered whether or
/// not they match; symlinked directories are reported but never entered, so
/// the walk stays inside the root and cannot cycle.
fn walk(
    root: &Path,
    start: &Path,
    pattern: &Pattern,
    max_results: usize,
) -> std::io::Result<(Vec<Entry>, bool)> {
    // Pattern and names are both lowercased, which folds non-ASCII case too.
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let mut matches = Vec::new();
    let mut pending: Vec<PathBuf> = vec![start.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(e) if dir == start => return Err(e),
            Err(e) => {
                tracing::debug!("Skipping unreadable directory {}: {}", dir.display(), e);
                continue;
            }
        };

        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(_) => continue,
            };
            let path = entry.path();

            if file_type.is_dir() {
                pending.push(path.clone());
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if !pattern.matches_with(&name.to_lowercase(), options) {
                continue;
            }

            if matches.len() >= max_results {
                return Ok((matches, true));
            }

            let is_folder = file_type.is_dir()
                || (file_type.is_symlink() && security::link_targets_dir_within(root, &path));

            matches.push(Entry {
                kind: if is_folder {
                    EntryKind::Folder
                } else {
                    EntryKind::File
                },
                name,
                relative_path: path_utils::to_protocol_path(root, &path),
            });
        }
    }

    Ok((matches, false))
}
