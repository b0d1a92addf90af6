//! Description of an uploaded file.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// The file handed to `Orchestrator::store`.
#[derive(Debug, Clone)]
pub struct Source {
    filename: String,
    content: SourceContent,
}

#[derive(Debug, Clone)]
enum SourceContent {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl Source {
    /// A file on disk, named after its last path component.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            filename,
            content: SourceContent::Path(path),
        }
    }

    /// A file on disk stored under a different name (e.g. an upload temp file).
    pub fn named(path: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: SourceContent::Path(path.into()),
        }
    }

    /// In-memory contents, spilled to `temp_dir` before processing.
    pub fn bytes(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: SourceContent::Bytes(data.into()),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Whether `materialize` writes a temp file the caller must remove.
    pub(crate) fn is_in_memory(&self) -> bool {
        matches!(self.content, SourceContent::Bytes(_))
    }

    /// Returns a path to the source contents, writing them out if needed.
    pub(crate) async fn materialize(&self, temp_dir: &Path) -> std::io::Result<PathBuf> {
        match &self.content {
            SourceContent::Path(path) => {
                if !tokio::fs::try_exists(path).await? {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("source file not found: {}", path.display()),
                    ));
                }
                Ok(path.clone())
            }
            SourceContent::Bytes(data) => {
                tokio::fs::create_dir_all(temp_dir).await?;
                let extension = Path::new(&self.filename)
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default();
                let path = temp_dir.join(format!("{}{}", Uuid::new_v4(), extension));
                tokio::fs::write(&path, data).await?;
                Ok(path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filename_from_path() {
        let source = Source::path("/uploads/tmp/coffee.jpg");
        assert_eq!(source.filename(), "coffee.jpg");
    }

    #[tokio::test]
    async fn test_materialize_bytes() {
        let temp = TempDir::new().unwrap();
        let source = Source::bytes("notes.txt", b"hello".to_vec());
        let path = source.materialize(temp.path()).await.unwrap();
        assert_eq!(path.extension().unwrap(), "txt");
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_materialize_missing_path() {
        let temp = TempDir::new().unwrap();
        let source = Source::path(temp.path().join("missing.jpg"));
        let err = source.materialize(temp.path()).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
