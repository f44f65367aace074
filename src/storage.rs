//! Storage boundary
//!
//! Sub-manifests are read and the master manifest is written through a
//! `Storage`. `LocalDisk` keeps everything under one root directory.

use std::path::{Path, PathBuf};

use crate::error::StorageError;

pub trait Storage {
    /// Absolute location of `name` inside this storage
    fn make_output_path(&self, name: &str) -> PathBuf;

    fn read_text(&self, path: &Path) -> Result<String, StorageError>;

    fn write_text(&self, path: &Path, content: &str) -> Result<(), StorageError>;

    fn exists(&self, path: &Path) -> bool;
}

/// Local filesystem rooted at a directory
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Storage for LocalDisk {
    fn make_output_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn read_text(&self, path: &Path) -> Result<String, StorageError> {
        let full = self.resolve(path);
        std::fs::read_to_string(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(full.clone())
            } else {
                StorageError::Io {
                    path: full.clone(),
                    source: e,
                }
            }
        })
    }

    fn write_text(&self, path: &Path, content: &str) -> Result<(), StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&full, content).map_err(|e| StorageError::Io { path: full, source: e })
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }
}
