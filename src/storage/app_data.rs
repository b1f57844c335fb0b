use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::snapshot::{self, WorkspaceSnapshot};

use super::{StorageBackend, WriteOutcome};

/// Fixed `workspace.lex` inside the desktop shell's app-data directory.
/// Unavailable outside the shell (no directory configured).
pub struct AppDataBackend {
    path: Option<PathBuf>,
}

impl AppDataBackend {
    pub fn new(app_data_dir: Option<PathBuf>, file_name: &str) -> Self {
        Self {
            path: app_data_dir.map(|dir| dir.join(file_name)),
        }
    }

    fn target(&self) -> Result<&PathBuf> {
        self.path
            .as_ref()
            .context("app-data storage is not available in this environment")
    }

    async fn write_document(&self, document: &str) -> Result<()> {
        let path = self.target()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create app-data directory {}", parent.display())
            })?;
        }
        tokio::fs::write(path, document)
            .await
            .with_context(|| format!("Failed to write workspace to {}", path.display()))
    }
}

#[async_trait]
impl StorageBackend for AppDataBackend {
    fn name(&self) -> &'static str {
        "app-data"
    }

    fn is_available(&self) -> bool {
        self.path.is_some()
    }

    async fn write(&self, document: &str) -> Result<WriteOutcome> {
        self.write_document(document).await?;
        Ok(WriteOutcome::Written)
    }

    async fn read(&self) -> Result<Option<String>> {
        let path = self.target()?;
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to read workspace from {}", path.display()))
            }
        }
    }

    /// Overwrites the file with an empty document instead of deleting it.
    async fn clear(&self) -> Result<()> {
        let empty = snapshot::encode(&WorkspaceSnapshot::empty())?;
        self.write_document(&empty).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_without_directory() {
        let backend = AppDataBackend::new(None, "workspace.lex");
        assert!(!backend.is_available());
    }

    #[tokio::test]
    async fn test_write_read_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let backend = AppDataBackend::new(Some(dir.path().join("app")), "workspace.lex");
        assert!(backend.is_available());
        assert_eq!(backend.read().await.unwrap(), None);

        backend.write("{\"x\":1}").await.unwrap();
        assert_eq!(backend.read().await.unwrap().as_deref(), Some("{\"x\":1}"));

        backend.clear().await.unwrap();
        let cleared = backend.read().await.unwrap().unwrap();
        let decoded = snapshot::decode(&cleared).unwrap();
        assert!(decoded.is_empty());
        assert!(decoded.last_synced.is_none());
    }
}
