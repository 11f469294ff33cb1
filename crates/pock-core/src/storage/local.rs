//! Filesystem book storage, used offline and in tests.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use super::{normalize_object_path, BookStorage, UploadSession};
use crate::error::{Error, Result};

const PARTIAL_SUFFIX: &str = ".part";

/// Stores objects as files under a root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBookStorage {
    root: PathBuf,
}

impl LocalBookStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of an object
    pub fn object_file(&self, object_path: &str) -> Result<PathBuf> {
        let object_path = normalize_object_path(object_path)?;
        Ok(object_path
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

/// In-progress write to a `.part` file
#[derive(Debug)]
pub struct LocalUploadSession {
    file: File,
    partial: PathBuf,
    target: PathBuf,
    written: u64,
}

impl BookStorage for LocalBookStorage {
    type Session = LocalUploadSession;

    async fn begin_upload(
        &self,
        object_path: &str,
        _content_type: &str,
        total_bytes: u64,
    ) -> Result<Self::Session> {
        let target = self.object_file(object_path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut partial = target.clone().into_os_string();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);
        let file = File::create(&partial).await?;

        tracing::debug!(path = %target.display(), total_bytes, "Started local upload");
        Ok(LocalUploadSession {
            file,
            partial,
            target,
            written: 0,
        })
    }

    async fn delete_object(&self, object_path: &str) -> Result<()> {
        let target = self.object_file(object_path)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                tracing::debug!(path = %target.display(), "Deleted local object");
                Ok(())
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

impl UploadSession for LocalUploadSession {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(mut self) -> Result<String> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);
        fs::rename(&self.partial, &self.target).await?;

        let absolute = fs::canonicalize(&self.target).await?;
        tracing::debug!(path = %absolute.display(), bytes = self.written, "Finished local upload");
        file_uri(&absolute)
    }

    async fn abort(self) -> Result<()> {
        drop(self.file);
        match fs::remove_file(&self.partial).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

fn file_uri(path: &Path) -> Result<String> {
    let rendered = path
        .to_str()
        .ok_or_else(|| Error::Storage(format!("Non UTF-8 path: {}", path.display())))?
        .replace('\\', "/");
    if rendered.starts_with('/') {
        Ok(format!("file://{rendered}"))
    } else {
        Ok(format!("file:///{rendered}"))
    }
}
