//! Filesystem staging store.

use crate::error::{StagingError, StagingResult};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// A boxed stream of bytes read back from a staged file.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + 'static>>;

/// Staging store rooted at a single directory.
///
/// File names are collision-resistant (caller prefix plus a random suffix);
/// no locking is used beyond exclusive-create semantics, since the directory
/// is shared process-wide.
#[derive(Clone, Debug)]
pub struct StagingStore {
    dir: PathBuf,
    prefix: String,
}

impl StagingStore {
    /// Create a staging store, ensuring the directory exists.
    pub async fn new(dir: impl AsRef<Path>, prefix: impl Into<String>) -> StagingResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            prefix: prefix.into(),
        })
    }

    /// Buffer a result stream to disk.
    ///
    /// The file is created exclusively with mode 0600 and the returned handle
    /// resolves only once every byte has reached the disk. On a write or
    /// stream error the partial file is deleted before the error surfaces.
    pub async fn stage<S, E>(&self, mut stream: S) -> StagingResult<StagedFile>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let path = self.dir.join(format!("{}-{}", self.prefix, Uuid::new_v4()));

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&path).await?;

        let mut len: u64 = 0;
        let result: StagingResult<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| StagingError::Upstream(e.to_string()))?;
                file.write_all(&chunk).await?;
                len += chunk.len() as u64;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;

        if let Err(err) = result {
            drop(file);
            StagedFile::remove_path(&path).await;
            return Err(err);
        }

        tracing::debug!(path = %path.display(), len, "staged result stream");
        Ok(StagedFile { path, len })
    }
}

/// A fully materialized result file awaiting its final hop.
///
/// Consuming the file deletes it, on the success and the failure branch
/// alike. A file that is never consumed is only leaked on crash, which is an
/// accepted limitation.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    len: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes staged.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Open a fresh read stream and hand it to the sink uploader.
    ///
    /// The staged file is deleted after the uploader returns, whatever its
    /// outcome, so this consumes the handle. The uploader receives the known
    /// byte length together with the stream.
    pub async fn consume<F, Fut, T>(self, sink: F) -> StagingResult<T>
    where
        F: FnOnce(u64, ByteStream) -> Fut,
        Fut: Future<Output = T>,
    {
        let file = match fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(err) => {
                Self::remove_path(&self.path).await;
                return Err(err.into());
            }
        };

        let stream: ByteStream = Box::pin(ReaderStream::new(file));
        let outcome = sink(self.len, stream).await;

        Self::remove_path(&self.path).await;
        Ok(outcome)
    }

    /// Delete the staged file without consuming it through a sink.
    pub async fn discard(self) {
        Self::remove_path(&self.path).await;
    }

    /// Idempotent delete: a missing file is not an error, anything else is
    /// logged and swallowed since there is no caller able to recover.
    async fn remove_path(path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to delete staged file");
            }
        }
    }
}
