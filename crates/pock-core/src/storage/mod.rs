//! Object storage backends for uploaded book files.

mod any;
mod local;
mod r2;

pub use any::{AnyBookStorage, AnyUploadSession};
pub use local::{LocalBookStorage, LocalUploadSession};
pub use r2::{R2BookStorage, R2Config, R2UploadSession};

use crate::error::{Error, Result};
use crate::models::ItemId;

/// Object storage that accepts books in chunks.
#[allow(async_fn_in_trait)]
pub trait BookStorage {
    type Session: UploadSession;

    /// Start writing an object at `object_path`
    async fn begin_upload(
        &self,
        object_path: &str,
        content_type: &str,
        total_bytes: u64,
    ) -> Result<Self::Session>;

    /// Remove a stored object. Missing objects are not an error.
    async fn delete_object(&self, object_path: &str) -> Result<()>;
}

/// One object being written.
///
/// Dropping a session without `finish` or `abort` may leave partial data
/// behind in the backend.
#[allow(async_fn_in_trait)]
pub trait UploadSession {
    /// Append the next chunk
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;

    /// Commit the object and return its download URI
    async fn finish(self) -> Result<String>;

    /// Discard everything written so far
    async fn abort(self) -> Result<()>;
}

impl<B: BookStorage> BookStorage for &B {
    type Session = B::Session;

    async fn begin_upload(
        &self,
        object_path: &str,
        content_type: &str,
        total_bytes: u64,
    ) -> Result<Self::Session> {
        (**self)
            .begin_upload(object_path, content_type, total_bytes)
            .await
    }

    async fn delete_object(&self, object_path: &str) -> Result<()> {
        (**self).delete_object(object_path).await
    }
}

/// Object path of a user's uploaded book: `users/{uid}/{upload_id}-{file}`.
///
/// The upload id keeps two books with the same file name in separate objects.
pub fn book_object_path(user_id: &str, upload_id: &ItemId, file_name: &str) -> Result<String> {
    let user_id = user_id.trim();
    if user_id.is_empty() || user_id.contains('/') {
        return Err(Error::InvalidInput(format!(
            "Invalid user id for object path: {user_id:?}"
        )));
    }
    Ok(format!(
        "users/{user_id}/{upload_id}-{}",
        crate::util::sanitize_file_name(file_name)
    ))
}

/// Trim slashes and reject empty or relative object paths
fn normalize_object_path(object_path: &str) -> Result<String> {
    let object_path = object_path.trim().trim_matches('/').to_string();
    if object_path.is_empty() {
        return Err(Error::InvalidInput(
            "Object path cannot be empty".to_string(),
        ));
    }
    if object_path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(Error::InvalidInput(format!(
            "Object path has an empty or relative segment: {object_path}"
        )));
    }
    Ok(object_path)
}
