//! Cloudflare R2 book storage using S3 multipart uploads.

use std::env;

use aws_credential_types::Credentials;
use aws_sdk_s3::{
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};
use aws_types::region::Region;

use super::{normalize_object_path, BookStorage, UploadSession};
use crate::{Error, Result};

const ENV_ACCOUNT_ID: &str = "R2_ACCOUNT_ID";
const ENV_BUCKET: &str = "R2_BUCKET";
const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
const ENV_PUBLIC_BASE_URL: &str = "R2_PUBLIC_BASE_URL";

/// S3 rejects non-final parts smaller than 5 MiB.
const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Cloudflare R2 configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct R2Config {
    /// Cloudflare account identifier.
    pub account_id: String,
    /// R2 bucket name.
    pub bucket: String,
    /// Access key id for S3-compatible auth.
    pub access_key_id: String,
    /// Secret access key for S3-compatible auth.
    pub secret_access_key: String,
    /// Optional public URL base for serving books.
    pub public_base_url: Option<String>,
}

impl std::fmt::Debug for R2Config {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("R2Config")
            .field("account_id", &self.account_id)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl R2Config {
    /// Load R2 configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no R2 variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load R2 configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        parse_config(lookup)
    }

    /// Cloudflare R2 S3-compatible endpoint URL.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }

    /// Download URI of an object: the public URL when configured, else `r2://bucket/key`.
    #[must_use]
    pub fn object_uri(&self, object_key: &str) -> String {
        let key = object_key.trim_matches('/');
        self.public_base_url.as_ref().map_or_else(
            || format!("r2://{}/{key}", self.bucket),
            |base| format!("{base}/{key}"),
        )
    }
}

/// R2-backed book storage.
#[derive(Clone, Debug)]
pub struct R2BookStorage {
    config: R2Config,
    client: Client,
}

impl R2BookStorage {
    #[must_use]
    pub fn new(config: R2Config) -> Self {
        let client = build_s3_client(&config);
        Self { config, client }
    }

    #[must_use]
    pub const fn config(&self) -> &R2Config {
        &self.config
    }

    /// Check that the configured bucket is reachable with current credentials.
    pub async fn bucket_is_reachable(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|error| storage_error("head_bucket", &self.config.bucket, None, error))?;
        Ok(())
    }
}

/// In-progress multipart upload.
///
/// Chunks are buffered until a full part is available.
#[derive(Debug)]
pub struct R2UploadSession {
    client: Client,
    config: R2Config,
    object_key: String,
    upload_id: String,
    buffer: Vec<u8>,
    parts: Vec<CompletedPart>,
}

impl BookStorage for R2BookStorage {
    type Session = R2UploadSession;

    async fn begin_upload(
        &self,
        object_path: &str,
        content_type: &str,
        total_bytes: u64,
    ) -> Result<Self::Session> {
        let object_key = normalize_object_path(object_path)?;
        let mut request = self
            .client
            .create_multipart_upload()
            .bucket(&self.config.bucket)
            .key(&object_key);
        if let Some(content_type) = normalize_content_type(Some(content_type)) {
            request = request.content_type(content_type);
        }

        let response = request.send().await.map_err(|error| {
            storage_error(
                "create_multipart_upload",
                &self.config.bucket,
                Some(&object_key),
                error,
            )
        })?;
        let upload_id = response
            .upload_id()
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                Error::Storage(format!(
                    "R2 create_multipart_upload returned no upload id for {object_key}"
                ))
            })?;

        tracing::debug!(object_key = %object_key, total_bytes, "Started R2 multipart upload");
        Ok(R2UploadSession {
            client: self.client.clone(),
            config: self.config.clone(),
            object_key,
            upload_id,
            buffer: Vec::with_capacity(MIN_PART_SIZE),
            parts: Vec::new(),
        })
    }

    async fn delete_object(&self, object_path: &str) -> Result<()> {
        let object_key = normalize_object_path(object_path)?;
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "delete_object",
                    &self.config.bucket,
                    Some(&object_key),
                    error,
                )
            })?;

        tracing::debug!(object_key = %object_key, "Deleted R2 object");
        Ok(())
    }
}

impl R2UploadSession {
    async fn flush_part(&mut self) -> Result<()> {
        let part_number = i32::try_from(self.parts.len() + 1)
            .map_err(|_| Error::Storage("Too many upload parts".to_string()))?;
        let body = std::mem::take(&mut self.buffer);

        let response = self
            .client
            .upload_part()
            .bucket(&self.config.bucket)
            .key(&self.object_key)
            .upload_id(&self.upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "upload_part",
                    &self.config.bucket,
                    Some(&self.object_key),
                    error,
                )
            })?;

        self.parts.push(
            CompletedPart::builder()
                .set_e_tag(response.e_tag().map(ToOwned::to_owned))
                .part_number(part_number)
                .build(),
        );
        Ok(())
    }
}

impl UploadSession for R2UploadSession {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() >= MIN_PART_SIZE {
            self.flush_part().await?;
        }
        Ok(())
    }

    async fn finish(mut self) -> Result<String> {
        // The last part may be short, and an empty object still needs one part
        if !self.buffer.is_empty() || self.parts.is_empty() {
            self.flush_part().await?;
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.config.bucket)
            .key(&self.object_key)
            .upload_id(&self.upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(std::mem::take(&mut self.parts)))
                    .build(),
            )
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "complete_multipart_upload",
                    &self.config.bucket,
                    Some(&self.object_key),
                    error,
                )
            })?;

        tracing::debug!(object_key = %self.object_key, "Finished R2 multipart upload");
        Ok(self.config.object_uri(&self.object_key))
    }

    async fn abort(self) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.config.bucket)
            .key(&self.object_key)
            .upload_id(&self.upload_id)
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "abort_multipart_upload",
                    &self.config.bucket,
                    Some(&self.object_key),
                    error,
                )
            })?;
        Ok(())
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<R2Config>> {
    let account_id = lookup(ENV_ACCOUNT_ID).map(|value| value.trim().to_string());
    let bucket = lookup(ENV_BUCKET).map(|value| value.trim().to_string());
    let access_key_id = lookup(ENV_ACCESS_KEY_ID).map(|value| value.trim().to_string());
    let secret_access_key = lookup(ENV_SECRET_ACCESS_KEY).map(|value| value.trim().to_string());
    let public_base_url = lookup(ENV_PUBLIC_BASE_URL).map(|value| value.trim().to_string());

    let any_present = account_id.is_some()
        || bucket.is_some()
        || access_key_id.is_some()
        || secret_access_key.is_some()
        || public_base_url.is_some();

    if !any_present {
        return Ok(None);
    }

    let mut missing = Vec::new();
    let account_id = required(account_id, ENV_ACCOUNT_ID, &mut missing);
    let bucket = required(bucket, ENV_BUCKET, &mut missing);
    let access_key_id = required(access_key_id, ENV_ACCESS_KEY_ID, &mut missing);
    let secret_access_key = required(secret_access_key, ENV_SECRET_ACCESS_KEY, &mut missing);

    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "R2 configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    }

    Ok(Some(R2Config {
        account_id,
        bucket,
        access_key_id,
        secret_access_key,
        public_base_url: normalize_public_base_url(public_base_url)?,
    }))
}

fn required(value: Option<String>, key: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value {
        Some(value) if !value.is_empty() => value,
        _ => {
            missing.push(key);
            String::new()
        }
    }
}

fn build_s3_client(config: &R2Config) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "pock-core-r2-storage",
    );

    let sdk_config = aws_sdk_s3::config::Builder::new()
        .region(Region::new("auto"))
        .credentials_provider(credentials)
        .endpoint_url(config.endpoint_url())
        .force_path_style(true)
        .build();

    Client::from_conf(sdk_config)
}

fn storage_error(
    operation: &str,
    bucket: &str,
    object_key: Option<&str>,
    error: impl std::fmt::Display,
) -> Error {
    let target = object_key.map_or_else(|| bucket.to_string(), |key| format!("{bucket}/{key}"));
    Error::Storage(format!("R2 {operation} failed for {target}: {error}"))
}

fn normalize_content_type(content_type: Option<&str>) -> Option<String> {
    content_type
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn normalize_public_base_url(public_base_url: Option<String>) -> Result<Option<String>> {
    let Some(value) = crate::util::normalize_text_option(public_base_url) else {
        return Ok(None);
    };

    if !crate::util::is_http_url(&value) {
        return Err(Error::InvalidInput(
            "R2_PUBLIC_BASE_URL must start with http:// or https://".to_string(),
        ));
    }

    Ok(Some(value.trim_end_matches('/').to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<Option<R2Config>> {
        parse_config(|key| map.get(key).map(|value| (*value).to_string()))
    }

    fn sample_config(public_base_url: Option<&str>) -> R2Config {
        R2Config {
            account_id: "account-1".to_string(),
            bucket: "books".to_string(),
            access_key_id: "AKID123".to_string(),
            secret_access_key: "SECRET123".to_string(),
            public_base_url: public_base_url.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn parse_config_none_returns_none() {
        let map = HashMap::new();
        assert!(parse_from_map(&map).unwrap().is_none());
    }

    #[test]
    fn parse_config_requires_all_required_values() {
        let mut map = HashMap::new();
        map.insert(ENV_ACCOUNT_ID, "account");
        map.insert(ENV_BUCKET, "bucket");

        let err = parse_from_map(&map).unwrap_err();
        match err {
            Error::InvalidInput(message) => {
                assert!(message.contains(ENV_ACCESS_KEY_ID));
                assert!(message.contains(ENV_SECRET_ACCESS_KEY));
                assert!(!message.contains(ENV_BUCKET));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_config_accepts_valid_values_and_normalizes_public_url() {
        let mut map = HashMap::new();
        map.insert(ENV_ACCOUNT_ID, "account-1");
        map.insert(ENV_BUCKET, "books");
        map.insert(ENV_ACCESS_KEY_ID, "AKID123");
        map.insert(ENV_SECRET_ACCESS_KEY, "SECRET123");
        map.insert(ENV_PUBLIC_BASE_URL, "https://cdn.example.com/books/");

        let config = parse_from_map(&map).unwrap().unwrap();
        assert_eq!(
            config.public_base_url.as_deref(),
            Some("https://cdn.example.com/books")
        );
        assert_eq!(
            config.endpoint_url(),
            "https://account-1.r2.cloudflarestorage.com"
        );
    }

    #[test]
    fn parse_config_rejects_invalid_public_base_url() {
        let mut map = HashMap::new();
        map.insert(ENV_ACCOUNT_ID, "account-1");
        map.insert(ENV_BUCKET, "books");
        map.insert(ENV_ACCESS_KEY_ID, "AKID123");
        map.insert(ENV_SECRET_ACCESS_KEY, "SECRET123");
        map.insert(ENV_PUBLIC_BASE_URL, "cdn.example.com/books");

        let err = parse_from_map(&map).unwrap_err();
        match err {
            Error::InvalidInput(message) => {
                assert!(message.contains("R2_PUBLIC_BASE_URL"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn object_uri_prefers_public_base_url() {
        assert_eq!(
            sample_config(Some("https://cdn.example.com")).object_uri("/users/u1/a.pdf"),
            "https://cdn.example.com/users/u1/a.pdf"
        );
        assert_eq!(
            sample_config(None).object_uri("users/u1/a.pdf"),
            "r2://books/users/u1/a.pdf"
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", sample_config(None));
        assert!(!rendered.contains("SECRET123"));
    }

    #[test]
    fn normalize_content_type_ignores_empty_values() {
        assert_eq!(normalize_content_type(None), None);
        assert_eq!(normalize_content_type(Some("   ")), None);
        assert_eq!(
            normalize_content_type(Some(" application/pdf ")),
            Some("application/pdf".to_string())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires local R2 env vars plus network access"]
    async fn r2_multipart_roundtrip_upload_delete() {
        let _ = dotenvy::dotenv();

        let config = R2Config::from_env()
            .expect("R2 env parsing should not error")
            .expect("R2 config should be present");
        let storage = R2BookStorage::new(config.clone());
        storage.bucket_is_reachable().await.unwrap_or_else(|error| {
            panic!(
                "R2 bucket health check failed for bucket '{}': {error}",
                config.bucket
            )
        });

        let object_path = super::super::book_object_path("integration", &crate::models::ItemId::new(), "roundtrip.pdf")
                .unwrap();
        let mut session = storage
            .begin_upload(&object_path, "application/pdf", 17)
            .await
            .unwrap();
        session.write_chunk(b"r2-roundtrip-test").await.unwrap();
        let uri = session
            .finish()
            .await
            .unwrap_or_else(|error| panic!("R2 upload failed: {error}"));
        assert!(uri.ends_with(&object_path));

        storage
            .delete_object(&object_path)
            .await
            .unwrap_or_else(|error| panic!("R2 delete failed: {error}"));
    }
}
