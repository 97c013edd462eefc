//! Ingest sources
//!
//! The producer reads the MJPEG stream from an [`IngestSource`]. A source can
//! be opened any number of times: the producer reopens it after a read error
//! or a normal end-of-stream.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncRead;

/// Byte stream returned by an ingest open
pub type IngestReader = Box<dyn AsyncRead + Send + Unpin>;

/// Something the producer can (re)open to get a fresh MJPEG byte stream
pub trait IngestSource: Send + Sync + 'static {
    /// Open the stream from its beginning
    fn open(&self) -> impl Future<Output = io::Result<IngestReader>> + Send;

    /// Human-readable name used in logs
    fn describe(&self) -> String;
}

/// File or named pipe on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IngestSource for FileSource {
    async fn open(&self) -> io::Result<IngestReader> {
        // Blocks until a writer appears when the path is a FIFO
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_file_source_reads_from_start_each_open() {
        let path = std::env::temp_dir().join(format!("mirrorfeed-ingest-{}", std::process::id()));
        tokio::fs::write(&path, b"abc").await.unwrap();

        let source = FileSource::new(&path);
        for _ in 0..2 {
            let mut reader = source.open().await.unwrap();
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).await.unwrap();
            assert_eq!(buf, b"abc");
        }

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_source_missing_path() {
        let source = FileSource::new("/nonexistent/mirrorfeed/ingest");
        assert!(source.open().await.is_err());
        assert_eq!(source.describe(), "/nonexistent/mirrorfeed/ingest");
    }
}
