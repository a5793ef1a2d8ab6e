//! Filesystem abstraction used by resolution and graph discovery.
//!
//! Every read the pipeline performs goes through [`Runtime`], so the resolver
//! and graph builder can run against an in-memory tree in tests. Writing the
//! output directory is the emitter's job and does not go through here.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::task;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("runtime error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
}

#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    async fn is_file(&self, path: &Path) -> bool {
        self.metadata(path).await.map(|m| m.is_file).unwrap_or(false)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        self.metadata(path).await.map(|m| m.is_dir).unwrap_or(false)
    }
}

/// `std::fs` on tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = path.to_path_buf();

        task::spawn_blocking(move || {
            std::fs::read(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::FileNotFound(path.clone())
                } else {
                    RuntimeError::Io(format!("failed to read {}: {}", path.display(), e))
                }
            })
        })
        .await
        .map_err(|e| RuntimeError::Other(format!("task join error: {e}")))?
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let path = path.to_path_buf();

        task::spawn_blocking(move || {
            let metadata = std::fs::metadata(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::FileNotFound(path.clone())
                } else {
                    RuntimeError::Io(format!(
                        "failed to get metadata for {}: {}",
                        path.display(),
                        e
                    ))
                }
            })?;

            Ok(FileMetadata {
                size: metadata.len(),
                is_dir: metadata.is_dir(),
                is_file: metadata.is_file(),
            })
        })
        .await
        .map_err(|e| RuntimeError::Other(format!("task join error: {e}")))?
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryRuntime;

#[cfg(any(test, feature = "test-utils"))]
mod memory {
    use super::*;
    use parking_lot::RwLock;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    /// In-memory file tree. Directories are implied by file paths.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryRuntime {
        files: Arc<RwLock<BTreeMap<PathBuf, Vec<u8>>>>,
    }

    impl MemoryRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_file(self, path: impl Into<PathBuf>, content: impl AsRef<[u8]>) -> Self {
            self.insert(path, content);
            self
        }

        pub fn insert(&self, path: impl Into<PathBuf>, content: impl AsRef<[u8]>) {
            self.files
                .write()
                .insert(path.into(), content.as_ref().to_vec());
        }

        pub fn remove(&self, path: &Path) {
            self.files.write().remove(path);
        }
    }

    #[async_trait]
    impl Runtime for MemoryRuntime {
        async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
            self.files
                .read()
                .get(path)
                .cloned()
                .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
        }

        async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
            let files = self.files.read();
            if let Some(content) = files.get(path) {
                return Ok(FileMetadata {
                    size: content.len() as u64,
                    is_dir: false,
                    is_file: true,
                });
            }
            if files.keys().any(|file| file.starts_with(path) && file != path) {
                return Ok(FileMetadata {
                    size: 0,
                    is_dir: true,
                    is_file: false,
                });
            }
            Err(RuntimeError::FileNotFound(path.to_path_buf()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn native_reads_and_stats() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hello").unwrap();

        let runtime = NativeRuntime::new();
        assert_eq!(runtime.read_file(&file).await.unwrap(), b"hello");
        assert!(runtime.is_file(&file).await);
        assert!(runtime.is_dir(dir.path()).await);
        assert_eq!(runtime.metadata(&file).await.unwrap().size, 5);
    }

    #[tokio::test]
    async fn native_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = NativeRuntime::new()
            .read_file(&dir.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn memory_runtime_implies_directories() {
        let runtime = MemoryRuntime::new().with_file("/p/src/index.ts", "x");
        assert!(runtime.is_dir(Path::new("/p/src")).await);
        assert!(runtime.is_file(Path::new("/p/src/index.ts")).await);
        assert!(!runtime.is_file(Path::new("/p/src/index")).await);
    }
}
