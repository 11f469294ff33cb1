//! Runtime-selected storage backend.

use super::{
    BookStorage, LocalBookStorage, LocalUploadSession, R2BookStorage, R2UploadSession,
    UploadSession,
};
use crate::config::StorageBackend;
use crate::error::Result;

/// Either storage backend, chosen from configuration
#[derive(Debug, Clone)]
pub enum AnyBookStorage {
    Local(LocalBookStorage),
    R2(R2BookStorage),
}

impl AnyBookStorage {
    #[must_use]
    pub fn from_backend(backend: StorageBackend) -> Self {
        match backend {
            StorageBackend::Local(root) => Self::Local(LocalBookStorage::new(root)),
            StorageBackend::R2(config) => Self::R2(R2BookStorage::new(config)),
        }
    }

    /// Short label for status output
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Local(storage) => format!("local ({})", storage.root().display()),
            Self::R2(storage) => format!("r2 ({})", storage.config().bucket),
        }
    }
}

/// Upload session of an [`AnyBookStorage`]
#[derive(Debug)]
pub enum AnyUploadSession {
    Local(LocalUploadSession),
    R2(R2UploadSession),
}

impl BookStorage for AnyBookStorage {
    type Session = AnyUploadSession;

    async fn begin_upload(
        &self,
        object_path: &str,
        content_type: &str,
        total_bytes: u64,
    ) -> Result<Self::Session> {
        match self {
            Self::Local(storage) => storage
                .begin_upload(object_path, content_type, total_bytes)
                .await
                .map(AnyUploadSession::Local),
            Self::R2(storage) => storage
                .begin_upload(object_path, content_type, total_bytes)
                .await
                .map(AnyUploadSession::R2),
        }
    }

    async fn delete_object(&self, object_path: &str) -> Result<()> {
        match self {
            Self::Local(storage) => storage.delete_object(object_path).await,
            Self::R2(storage) => storage.delete_object(object_path).await,
        }
    }
}

impl UploadSession for AnyUploadSession {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        match self {
            Self::Local(session) => session.write_chunk(chunk).await,
            Self::R2(session) => session.write_chunk(chunk).await,
        }
    }

    async fn finish(self) -> Result<String> {
        match self {
            Self::Local(session) => session.finish().await,
            Self::R2(session) => session.finish().await,
        }
    }

    async fn abort(self) -> Result<()> {
        match self {
            Self::Local(session) => session.abort().await,
            Self::R2(session) => session.abort().await,
        }
    }
}
