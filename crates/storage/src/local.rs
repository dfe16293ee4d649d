//! Filesystem backend used in development and in tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::{
    collision_variant, validate_name, Listing, ObjectStorage, StorageError,
};

#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
    url_prefix: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), url_prefix: "/media".to_string() }
    }

    pub fn with_url_prefix(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let mut prefix = url_prefix.into();
        while prefix.ends_with('/') {
            prefix.pop();
        }
        Self { root: root.into(), url_prefix: prefix }
    }

    fn absolute(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    async fn path_exists(path: &Path) -> bool {
        fs::metadata(path).await.is_ok()
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn save(&self, name: &str, content: &[u8]) -> Result<String, StorageError> {
        validate_name(name)?;

        let mut chosen = name.to_string();
        while Self::path_exists(&self.absolute(&chosen)).await {
            chosen = collision_variant(name);
        }

        let path = self.absolute(&chosen);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Io { name: chosen.clone(), source })?;
        }

        fs::write(&path, content)
            .await
            .map_err(|source| StorageError::Io { name: chosen.clone(), source })?;

        debug!(event_name = "storage.local.saved", object = %chosen, bytes = content.len());
        Ok(chosen)
    }

    async fn open(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        validate_name(name)?;

        let path = self.absolute(name);
        match fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound { name: name.to_string() })
            }
            Err(source) => Err(StorageError::Io { name: name.to_string(), source }),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        validate_name(name)?;

        match fs::remove_file(self.absolute(name)).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { name: name.to_string(), source }),
        }
    }

    async fn exists(&self, name: &str) -> bool {
        if validate_name(name).is_err() {
            return false;
        }
        Self::path_exists(&self.absolute(name)).await
    }

    async fn list(&self, prefix: &str) -> Listing {
        if !prefix.is_empty() && validate_name(prefix).is_err() {
            return (Vec::new(), Vec::new());
        }

        let dir = if prefix.is_empty() { self.root.clone() } else { self.absolute(prefix) };
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return (Vec::new(), Vec::new()),
        };

        let mut directories = Vec::new();
        let mut files = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => directories.push(name),
                Ok(_) => files.push(name),
                Err(_) => {}
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
        fs::metadata(self.absolute(name)).await.map(|metadata| metadata.len()).unwrap_or(0)
    }

    fn url(&self, name: &str) -> String {
        format!("{}/{name}", self.url_prefix)
    }
}
