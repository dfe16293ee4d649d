//! Supabase Storage backend.
//!
//! Speaks the Supabase Storage REST API directly: objects live under
//! `/storage/v1/object/{bucket}/{name}` and listings are served by
//! `POST /storage/v1/object/list/{bucket}`. Probe operations (`exists`,
//! `list`, `size`) degrade gracefully on transport failures so that a
//! flaky storage host never takes catalog pages down with it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    collision_variant, guess_content_type, validate_name, Listing, ObjectStorage, StorageError,
};

const DIRECTORY_MIMETYPE: &str = "application/x-directory";

#[derive(Clone)]
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    service_key: SecretString,
}

#[derive(Debug, Serialize)]
struct ListRequest<'a> {
    prefix: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    name: String,
    #[serde(default)]
    metadata: Option<EntryMetadata>,
}

#[derive(Debug, Deserialize)]
struct EntryMetadata {
    #[serde(default)]
    mimetype: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

impl ListEntry {
    /// Supabase reports folders as entries with no metadata or with the
    /// synthetic directory mimetype.
    fn is_directory(&self) -> bool {
        match &self.metadata {
            None => true,
            Some(metadata) => metadata.mimetype.as_deref() == Some(DIRECTORY_MIMETYPE),
        }
    }
}

impl SupabaseStorage {
    pub fn new(
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        service_key: SecretString,
        request_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| StorageError::Transport(err.to_string()))?;

        Ok(Self { client, base_url, bucket: bucket.into(), service_key })
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/storage/v1/object/{}/{name}", self.base_url, self.bucket)
    }

    fn list_url(&self) -> String {
        format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.service_key.expose_secret())
    }

    async fn backend_error(name: &str, response: reqwest::Response) -> StorageError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return StorageError::NotFound { name: name.to_string() };
        }
        let body = response.text().await.unwrap_or_default();
        StorageError::Backend { status: status.as_u16(), body }
    }

    async fn fetch_entries(&self, prefix: &str) -> Result<Vec<ListEntry>, StorageError> {
        let response = self
            .client
            .post(self.list_url())
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .json(&ListRequest { prefix })
            .send()
            .await
            .map_err(|err| StorageError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::backend_error(prefix, response).await);
        }

        response.json::<Vec<ListEntry>>().await.map_err(|err| {
            StorageError::Transport(format!("invalid listing payload: {err}"))
        })
    }

    /// Find the listing entry for `name` by listing its parent prefix.
    async fn find_entry(&self, name: &str) -> Result<Option<ListEntry>, StorageError> {
        let (prefix, file_name) = match name.rsplit_once('/') {
            Some((prefix, file_name)) => (prefix, file_name),
            None => ("", name),
        };

        let entries = self.fetch_entries(prefix).await?;
        Ok(entries.into_iter().find(|entry| entry.name == file_name))
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn save(&self, name: &str, content: &[u8]) -> Result<String, StorageError> {
        validate_name(name)?;

        let mut chosen = name.to_string();
        while self.exists(&chosen).await {
            chosen = collision_variant(name);
        }

        let response = self
            .client
            .post(self.object_url(&chosen))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .header(reqwest::header::CONTENT_TYPE, guess_content_type(&chosen))
            .header("x-upsert", "false")
            .body(content.to_vec())
            .send()
            .await
            .map_err(|err| StorageError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::backend_error(&chosen, response).await);
        }

        debug!(event_name = "storage.supabase.saved", object = %chosen, bytes = content.len());
        Ok(chosen)
    }

    async fn open(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        validate_name(name)?;

        let response = self
            .client
            .get(self.object_url(name))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(|err| StorageError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::backend_error(name, response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| StorageError::Transport(err.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        validate_name(name)?;

        let response = self
            .client
            .delete(self.object_url(name))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(|err| StorageError::Transport(err.to_string()))?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(Self::backend_error(name, response).await)
    }

    async fn exists(&self, name: &str) -> bool {
        if validate_name(name).is_err() {
            return false;
        }

        match self.find_entry(name).await {
            Ok(entry) => entry.is_some(),
            Err(error) => {
                warn!(
                    event_name = "storage.supabase.exists_probe_failed",
                    object = %name,
                    error = %error,
                );
                false
            }
        }
    }

    async fn list(&self, prefix: &str) -> Listing {
        if !prefix.is_empty() && validate_name(prefix).is_err() {
            return (Vec::new(), Vec::new());
        }

        let entries = match self.fetch_entries(prefix).await {
            Ok(entries) => entries,
            Err(error) => {
                warn!(
                    event_name = "storage.supabase.list_failed",
                    prefix = %prefix,
                    error = %error,
                );
                return (Vec::new(), Vec::new());
            }
        };

        let mut directories = Vec::new();
        let mut files = Vec::new();
        for entry in entries {
            if entry.is_directory() {
                directories.push(entry.name);
            } else {
                files.push(entry.name);
            }
        }

        directories.sort();
        files.sort();
        (directories, files)
    }

    async fn size(&self, name: &str) -> u64 {
        if validate_name(name).is_err() {
            return 0;
        }

        match self.find_entry(name).await {
            Ok(Some(entry)) => entry.metadata.and_then(|metadata| metadata.size).unwrap_or(0),
            Ok(None) => 0,
            Err(error) => {
                warn!(
                    event_name = "storage.supabase.size_probe_failed",
                    object = %name,
                    error = %error,
                );
                0
            }
        }
    }

    fn url(&self, name: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{name}", self.base_url, self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ListEntry, SupabaseStorage};
    use crate::ObjectStorage;

    fn unreachable_storage() -> SupabaseStorage {
        // 127.0.0.1:1 refuses connections immediately.
        SupabaseStorage::new(
            "http://127.0.0.1:1",
            "pozinox-media",
            "service-role-key".into(),
            Duration::from_millis(250),
        )
        .unwrap()
    }

    #[test]
    fn public_url_shape() {
        let storage = SupabaseStorage::new(
            "https://project.supabase.co/",
            "pozinox-media",
            "service-role-key".into(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            storage.url("products/img.png"),
            "https://project.supabase.co/storage/v1/object/public/pozinox-media/products/img.png"
        );
    }

    #[test]
    fn listing_entry_directory_detection() {
        let directory: ListEntry =
            serde_json::from_str(r#"{"name": "products", "metadata": null}"#).unwrap();
        assert!(directory.is_directory());

        let synthetic: ListEntry = serde_json::from_str(
            r#"{"name": "archive", "metadata": {"mimetype": "application/x-directory"}}"#,
        )
        .unwrap();
        assert!(synthetic.is_directory());

        let file: ListEntry = serde_json::from_str(
            r#"{"name": "img.png", "metadata": {"mimetype": "image/png", "size": 2048}}"#,
        )
        .unwrap();
        assert!(!file.is_directory());
        assert_eq!(file.metadata.and_then(|metadata| metadata.size), Some(2048));
    }

    #[tokio::test]
    async fn probes_degrade_gracefully_on_transport_failure() {
        let storage = unreachable_storage();

        assert!(!storage.exists("products/img.png").await);
        assert_eq!(storage.size("products/img.png").await, 0);

        let (dirs, files) = storage.list("products").await;
        assert!(dirs.is_empty() && files.is_empty());
    }

    #[tokio::test]
    async fn open_reports_transport_failure() {
        let storage = unreachable_storage();
        let error = storage.open("products/img.png").await.unwrap_err();
        assert!(matches!(error, crate::StorageError::Transport(_)));
    }
}
