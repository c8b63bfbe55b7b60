//! Temporary storage of uploaded files.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{trace, warn};

use crate::protocol::FileMeta;

static UPLOAD_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Attempts at finding an unused file name before giving up.
const MAX_CREATE_ATTEMPTS: usize = 32;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file part being written to disk.
#[derive(Debug)]
pub(crate) struct Upload {
    field_name: String,
    original_name: String,
    mime_type: String,
    path: PathBuf,
    file: File,
    size: u64,
}

impl Upload {
    /// Creates a new, uniquely named file under `dir`.
    pub(crate) async fn create(
        dir: &Path,
        field_name: String,
        original_name: String,
        mime_type: Option<String>,
    ) -> io::Result<Self> {
        let (path, file) = create_unique_file(dir).await?;
        trace!(path = %path.display(), field = field_name, "created upload file");

        Ok(Self {
            field_name,
            original_name,
            mime_type: mime_type.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned()),
            path,
            file,
            size: 0,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes).await?;
        self.size += bytes.len() as u64;
        Ok(())
    }

    /// Flushes the file and describes it.
    pub(crate) async fn finish(mut self) -> io::Result<FileMeta> {
        self.file.flush().await?;
        Ok(FileMeta {
            field_name: self.field_name,
            original_name: self.original_name,
            stored_path: self.path,
            mime_type: self.mime_type,
            size_bytes: self.size,
        })
    }
}

async fn create_unique_file(dir: &Path) -> io::Result<(PathBuf, File)> {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();

    for _ in 0..MAX_CREATE_ATTEMPTS {
        let counter = UPLOAD_COUNTER.fetch_add(1, Ordering::Relaxed);
        let candidate = dir.join(format!("micro-body-{}-{nanos}-{counter}.upload", std::process::id()));

        match OpenOptions::new().create_new(true).write(true).open(&candidate).await {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(io::ErrorKind::AlreadyExists, "failed to allocate an unique upload file"))
}

/// Removes the files of a failed decode.
pub(crate) async fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            // a file which is already gone is fine
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), cause = %e, "failed to remove upload file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_finish() {
        let dir = tempfile::tempdir().unwrap();
        let mut upload = Upload::create(dir.path(), "avatar".into(), "me.png".into(), Some("image/png".into()))
            .await
            .unwrap();

        upload.write(b"hello ").await.unwrap();
        upload.write(b"world").await.unwrap();
        let meta = upload.finish().await.unwrap();

        assert_eq!(meta.field_name, "avatar");
        assert_eq!(meta.original_name, "me.png");
        assert_eq!(meta.mime_type, "image/png");
        assert_eq!(meta.size_bytes, 11);
        assert!(meta.stored_path.starts_with(dir.path()));
        assert_eq!(std::fs::read(&meta.stored_path).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let first = Upload::create(dir.path(), "a".into(), "a.txt".into(), None).await.unwrap();
        let second = Upload::create(dir.path(), "a".into(), "a.txt".into(), None).await.unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(first.mime_type, DEFAULT_MIME_TYPE);
    }

    #[tokio::test]
    async fn test_remove_all() {
        let dir = tempfile::tempdir().unwrap();
        let upload = Upload::create(dir.path(), "a".into(), "a.txt".into(), None).await.unwrap();
        let path = upload.path().to_path_buf();
        drop(upload);

        let missing = dir.path().join("missing");
        remove_all(&[path.clone(), missing]).await;
        assert!(!path.exists());
    }
}
