//! Book uploads with progress reporting.
//!
//! [`Uploader::upload`] validates the request and returns an [`UploadEvents`]
//! sequence without touching the file. Each `next().await` moves at most one
//! chunk, so the caller controls the pace and can stop at any time.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::auth::UserIdentity;
use crate::error::Result;
use crate::models::{BookFormat, BookMetadata, BookRecord, Item, ItemId};
use crate::paging::RemoteCollection;
use crate::storage::{book_object_path, BookStorage, UploadSession};

/// Default bytes moved per event
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// One step of an upload
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// Fraction of the file stored so far, in `[0, 1]`
    Progress(f64),
    /// The book is stored and recorded in the uploads collection
    Completed(Item),
    /// The upload stopped; nothing was recorded
    Failed(String),
}

impl UploadEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

/// Moves book files into storage and records them in a collection
#[derive(Debug, Clone)]
pub struct Uploader<S> {
    storage: S,
    chunk_size: usize,
}

impl<S: BookStorage> Uploader<S> {
    pub const fn new(storage: S) -> Self {
        Self {
            storage,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Use a different chunk size; zero is treated as one byte
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 { 1 } else { chunk_size };
        self
    }

    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Prepare an upload of `file` for `user`, recorded in `uploads`.
    ///
    /// Fails immediately for unsupported file types. Everything else is
    /// reported through the returned events.
    pub fn upload<'a, C: RemoteCollection>(
        &'a self,
        user: &UserIdentity,
        uploads: &'a C,
        file: impl AsRef<Path>,
        metadata: BookMetadata,
    ) -> Result<UploadEvents<'a, S, C>> {
        let file = file.as_ref().to_path_buf();
        let format = BookFormat::from_path(&file)?;
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let object_path = book_object_path(&user.id, &ItemId::new(), &name)?;

        tracing::debug!(file = %file.display(), object_path = %object_path, "Prepared upload");
        Ok(UploadEvents {
            storage: &self.storage,
            uploads,
            chunk_size: self.chunk_size,
            file,
            name: crate::util::sanitize_file_name(&name),
            object_path,
            format,
            metadata,
            stage: Stage::Pending,
        })
    }
}

enum Stage<U> {
    Pending,
    Transferring(Transfer<U>),
    Done,
}

struct Transfer<U> {
    file: File,
    session: U,
    sent: u64,
    total: u64,
    last_ratio: Option<f64>,
    buffer: Vec<u8>,
}

/// Lazy, finite sequence of upload events.
///
/// Yields `Progress` events with non-decreasing ratios, then exactly one
/// `Completed` or `Failed`, then `None` forever.
pub struct UploadEvents<'a, S: BookStorage, C> {
    storage: &'a S,
    uploads: &'a C,
    chunk_size: usize,
    file: PathBuf,
    name: String,
    object_path: String,
    format: BookFormat,
    metadata: BookMetadata,
    stage: Stage<S::Session>,
}

impl<S: BookStorage, C: RemoteCollection> UploadEvents<'_, S, C> {
    /// Object path the book is written to
    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    /// Whether the terminal event has been yielded
    pub const fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Done)
    }

    /// Advance the upload by one step
    pub async fn next(&mut self) -> Option<UploadEvent> {
        loop {
            match std::mem::replace(&mut self.stage, Stage::Done) {
                Stage::Done => return None,
                Stage::Pending => match self.start().await {
                    Ok(transfer) => self.stage = Stage::Transferring(transfer),
                    Err(error) => return Some(self.fail(&error.to_string())),
                },
                Stage::Transferring(mut transfer) => {
                    let read = match transfer.file.read(&mut transfer.buffer).await {
                        Ok(read) => read,
                        Err(error) => return Some(self.abort(transfer, &error.to_string()).await),
                    };

                    if read == 0 {
                        if transfer.last_ratio.map_or(true, |ratio| ratio < 1.0) {
                            transfer.last_ratio = Some(1.0);
                            self.stage = Stage::Transferring(transfer);
                            return Some(UploadEvent::Progress(1.0));
                        }
                        return Some(self.complete(transfer).await);
                    }

                    if let Err(error) = transfer
                        .session
                        .write_chunk(&transfer.buffer[..read])
                        .await
                    {
                        return Some(self.abort(transfer, &error.to_string()).await);
                    }
                    transfer.sent += read as u64;

                    let ratio = progress_ratio(transfer.sent, transfer.total)
                        .max(transfer.last_ratio.unwrap_or(0.0));
                    transfer.last_ratio = Some(ratio);
                    self.stage = Stage::Transferring(transfer);
                    return Some(UploadEvent::Progress(ratio));
                }
            }
        }
    }

    async fn start(&self) -> Result<Transfer<S::Session>> {
        let file = File::open(&self.file).await?;
        let total = file.metadata().await?.len();
        let session = self
            .storage
            .begin_upload(&self.object_path, self.format.mime_type(), total)
            .await?;

        tracing::info!(object_path = %self.object_path, total, "Uploading book");
        Ok(Transfer {
            file,
            session,
            sent: 0,
            total,
            last_ratio: None,
            buffer: vec![0; self.chunk_size],
        })
    }

    async fn complete(&self, transfer: Transfer<S::Session>) -> UploadEvent {
        let size = transfer.sent;
        let uri = match transfer.session.finish().await {
            Ok(uri) => uri,
            Err(error) => return self.fail(&error.to_string()),
        };

        let record = BookRecord {
            name: self.name.clone(),
            path: self.object_path.clone(),
            uri,
            mime_type: self.format.mime_type().to_string(),
            size,
            metadata: self.metadata.clone(),
        };

        let inserted = match record.to_fields() {
            Ok(fields) => self.uploads.insert(fields).await,
            Err(error) => Err(error),
        };
        match inserted {
            Ok(item) => {
                tracing::info!(id = %item.id, object_path = %self.object_path, "Upload recorded");
                UploadEvent::Completed(item)
            }
            Err(error) => {
                if let Err(cleanup) = self.storage.delete_object(&self.object_path).await {
                    tracing::warn!(
                        "Failed to remove {} after record insert failed: {}",
                        self.object_path,
                        cleanup
                    );
                }
                self.fail(&error.to_string())
            }
        }
    }

    async fn abort(&self, transfer: Transfer<S::Session>, message: &str) -> UploadEvent {
        if let Err(error) = transfer.session.abort().await {
            tracing::warn!("Failed to abort upload of {}: {}", self.object_path, error);
        }
        self.fail(message)
    }

    fn fail(&self, message: &str) -> UploadEvent {
        tracing::warn!(object_path = %self.object_path, "Upload failed: {}", message);
        UploadEvent::Failed(message.to_string())
    }
}

#[allow(clippy::cast_precision_loss)]
fn progress_ratio(sent: u64, total: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (sent as f64 / total as f64).clamp(0.0, 1.0)
}
