//! Sandboxed file system service: everything a client can see or touch lives
//! under one configured root.

pub mod config;
pub mod mime;
pub mod operations;
pub mod path_utils;
pub mod preview;
pub mod search;
pub mod security;


use std::sync::Arc;

use config::FileSystemConfig;
use operations::FileOperations;
use preview::FilePreview;
use search::FileSearch;
use security::PathResolver;

pub struct FileSystemService {
    config: Arc<FileSystemConfig>,
    resolver: Arc<PathResolver>,
    ops: FileOperations,
    search: FileSearch,
    preview: FilePreview,
}

impl FileSystemService {
    pub fn new(config: FileSystemConfig) -> Self {
        let config = Arc::new(config);
        let resolver = Arc::new(PathResolver::new(config.clone()));
        let ops = FileOperations::new(resolver.clone(), config.clone());
        let search = FileSearch::new(ops.clone());
        let preview = FilePreview::new(ops.clone());
        Self {
            config,
            resolver,
            ops,
            search,
            preview,
        }
    }

    pub fn config(&self) -> &FileSystemConfig {
        self.config.as_ref()
    }

    pub fn resolver(&self) -> &PathResolver {
        self.resolver.as_ref()
    }

    pub fn ops(&self) -> &FileOperations {
        &self.ops
    }

    pub fn search(&self) -> &FileSearch {
        &self.search
    }

    pub fn preview(&self) -> &FilePreview {
        &self.preview
    }
}
