use crate::error::Result;
use derivative::Derivative;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Byte source handed to the transport when an upload starts.
pub type FileReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Where the bytes of a tracked file come from.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub enum FileSource {
    Path(PathBuf),
    Memory(#[derivative(Debug = "ignore")] Arc<[u8]>),
}

/// A file chosen for upload. Bytes are only read when an upload starts.
#[derive(Debug, Clone)]
pub struct FileRef {
    pub name: String,
    pub size: u64,
    pub source: FileSource,
}

impl FileRef {
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
            })?
            .to_string_lossy()
            .to_string();

        Ok(Self {
            name,
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    /// Opens the file for streaming and returns its current length.
    ///
    /// Path-backed files are read from disk as the upload proceeds; in-memory
    /// files share their buffer with the registry.
    pub async fn open(&self) -> Result<(FileReader, u64)> {
        match &self.source {
            FileSource::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                let length = file.metadata().await?.len();
                Ok((Box::new(file), length))
            }
            FileSource::Memory(data) => {
                Ok((Box::new(Cursor::new(data.clone())), data.len() as u64))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Uploading,
    Success,
    Error,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UploadStatus::Pending => "Pending",
            UploadStatus::Uploading => "Uploading",
            UploadStatus::Success => "Success",
            UploadStatus::Error => "Error",
        };
        f.write_str(label)
    }
}

/// Extra data carried along with a status change.
#[derive(Debug, Clone, Default)]
pub struct StatusInfo {
    /// Elapsed upload time in seconds.
    pub upload_time: Option<f64>,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl StatusInfo {
    pub fn success(upload_time: f64, url: impl Into<String>) -> Self {
        Self {
            upload_time: Some(upload_time),
            url: Some(url.into()),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadItem {
    pub file: FileRef,
    pub status: UploadStatus,
    pub progress: u8,
    pub upload_info: String,
    pub url: String,
}

impl UploadItem {
    pub fn new(file: FileRef) -> Self {
        Self {
            file,
            status: UploadStatus::Pending,
            progress: 0,
            upload_info: "-".to_string(),
            url: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub total_files: usize,
    pub total_size: String,
    pub pending_files: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn open_streams_path_backed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, b"a,b\n1,2\n").unwrap();

        let file = FileRef::from_path(&path).unwrap();
        assert_eq!(file.name, "report.csv");
        assert_eq!(file.size, 8);

        let (mut reader, length) = file.open().await.unwrap();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.unwrap();
        assert_eq!(length, 8);
        assert_eq!(contents, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn open_shares_in_memory_buffer() {
        let data: Arc<[u8]> = Arc::from(&b"dropped bytes"[..]);
        let file = FileRef::from_bytes("drop.bin", data.clone());

        let (mut reader, length) = file.open().await.unwrap();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.unwrap();

        assert_eq!(length, 13);
        assert_eq!(contents, b"dropped bytes");
        // Registry entry and reader both point at the original buffer.
        assert_eq!(Arc::strong_count(&data), 3);
    }

    #[tokio::test]
    async fn open_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileRef {
            name: "gone.txt".to_string(),
            size: 0,
            source: FileSource::Path(dir.path().join("gone.txt")),
        };
        assert!(matches!(
            file.open().await,
            Err(crate::error::UploadError::Io(_))
        ));
    }
}
