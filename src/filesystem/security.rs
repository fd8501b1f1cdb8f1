use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use path_jail::Jail;

use crate::protocol::FileSystemError;

use super::config::FileSystemConfig;
use super::path_utils;

/// An absolute path proven to lie inside the configured root, together with
/// the client string that asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    absolute: PathBuf,
    requested: String,
    relative: String,
}

impl ResolvedPath {
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// The path exactly as the client sent it
    pub fn requested(&self) -> &str {
        &self.requested
    }

    /// Root-relative, `/`-separated form of the resolved location
    pub fn relative(&self) -> &str {
        &self.relative
    }
}

/// Resolves client paths against the root. Every filesystem access driven by
/// a client path goes through here first.
pub struct PathResolver {
    config: Arc<FileSystemConfig>,
    jail: Option<Jail>,
}

impl PathResolver {
    pub fn new(config: Arc<FileSystemConfig>) -> Self {
        let jail = Jail::new(&config.root).ok();
        if jail.is_none() {
            tracing::warn!(
                "Could not build jail for {}; relying on prefix checks only",
                config.root.display()
            );
        }
        Self { config, jail }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Resolve `client_path` without requiring the target to exist.
    ///
    /// Components are applied one at a time from the canonical root. Each
    /// existing prefix is canonicalized so symlinks are followed before the
    /// containment check, and containment is re-checked after every step. A
    /// `..` that leaves the root is rejected before any filesystem call.
    pub fn resolve(&self, client_path: &str) -> Result<ResolvedPath, FileSystemError> {
        self.walk(Path::new(client_path), client_path)
    }

    /// Component walk of `path`; errors and the result report `client_path`.
    fn walk(&self, path: &Path, client_path: &str) -> Result<ResolvedPath, FileSystemError> {
        let root = self.root();
        let mut current = root.to_path_buf();

        for component in path.components() {
            match component {
                Component::CurDir => continue,
                Component::ParentDir => {
                    current.pop();
                }
                Component::Normal(part) => {
                    current.push(part);
                    match current.canonicalize() {
                        Ok(canonical) => current = canonical,
                        Err(e) if is_missing(&e) => {}
                        Err(e) => {
                            tracing::debug!("Canonicalization failed for {:?}: {}", client_path, e);
                            return Err(access_denied(client_path));
                        }
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(access_denied(client_path));
                }
            }

            if !current.starts_with(root) {
                tracing::warn!("Rejected path escaping root: {:?}", client_path);
                return Err(access_denied(client_path));
            }
        }

        Ok(ResolvedPath {
            relative: path_utils::to_protocol_path(root, &current),
            absolute: current,
            requested: client_path.to_string(),
        })
    }

    /// Second stage: the resolved path must exist.
    ///
    /// Re-canonicalizes so a symlink created or retargeted since `resolve`
    /// cannot smuggle the path outside the root.
    pub fn require_existing(&self, resolved: ResolvedPath) -> Result<ResolvedPath, FileSystemError> {
        let canonical = match resolved.absolute.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) if is_missing(&e) => {
                return Err(FileSystemError::NotFound {
                    path: resolved.requested,
                })
            }
            Err(_) => return Err(access_denied(&resolved.requested)),
        };

        self.ensure_contained(&canonical, &resolved.requested)?;

        Ok(ResolvedPath {
            relative: path_utils::to_protocol_path(self.root(), &canonical),
            absolute: canonical,
            requested: resolved.requested,
        })
    }

    /// `resolve` followed by `require_existing`
    pub fn resolve_existing(&self, client_path: &str) -> Result<ResolvedPath, FileSystemError> {
        let resolved = self.resolve(client_path)?;
        self.require_existing(resolved)
    }

    /// Resolve `client_path` to the directory entry it names, without following
    /// a symlink in the final component.
    ///
    /// The parent goes through `resolve` and `require_existing`; the entry
    /// itself must exist, possibly as a dangling link. Paths with no final name
    /// (the root, or one ending in `..`) resolve like `resolve_existing`.
    pub fn resolve_entry(&self, client_path: &str) -> Result<ResolvedPath, FileSystemError> {
        let path = Path::new(client_path);
        let name = match path.components().next_back() {
            Some(Component::Normal(name)) => name.to_os_string(),
            _ => return self.resolve_existing(client_path),
        };

        let parent = self.walk(path.parent().unwrap_or(Path::new("")), client_path)?;
        let parent = self.require_existing(parent)?;
        let absolute = parent.absolute.join(name);

        if let Err(e) = std::fs::symlink_metadata(&absolute) {
            if is_missing(&e) {
                return Err(FileSystemError::NotFound {
                    path: client_path.to_string(),
                });
            }
            return Err(access_denied(client_path));
        }

        Ok(ResolvedPath {
            relative: path_utils::to_protocol_path(self.root(), &absolute),
            absolute,
            requested: client_path.to_string(),
        })
    }

    fn ensure_contained(&self, canonical: &Path, requested: &str) -> Result<(), FileSystemError> {
        let in_root = canonical.starts_with(self.root());
        let in_jail = self
            .jail
            .as_ref()
            .map_or(true, |jail| jail.contains(canonical).is_ok());

        if !in_root || !in_jail {
            tracing::warn!("Rejected path escaping root: {:?}", requested);
            return Err(access_denied(requested));
        }

        Ok(())
    }
}

/// Whether the symlink at `link` points at a directory inside `root`. Targets
/// outside `root` are never inspected and count as not-a-directory.
pub fn link_targets_dir_within(root: &Path, link: &Path) -> bool {
    match link.canonicalize() {
        Ok(target) if target.starts_with(root) => target.is_dir(),
        _ => false,
    }
}

fn access_denied(client_path: &str) -> FileSystemError {
    FileSystemError::AccessDenied {
        attempted_path: client_path.to_string(),
    }
}

/// Missing targets, including a regular file used as a directory component
fn is_missing(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::NotFound {
        return true;
    }
    #[cfg(unix)]
    {
        const ENOTDIR: i32 = 20;
        if err.raw_os_error() == Some(ENOTDIR) {
            return true;
        }
    }
    false
}
