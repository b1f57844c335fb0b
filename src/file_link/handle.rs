use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{FileHandle, PermissionState};

/// A linked file addressed by a plain filesystem path.
#[derive(Debug, Clone)]
pub struct PathFileHandle {
    path: PathBuf,
}

impl PathFileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parent(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

#[async_trait]
impl FileHandle for PathFileHandle {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    async fn query_permission(&self) -> PermissionState {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() && !meta.permissions().readonly() => PermissionState::Granted,
            Ok(_) => PermissionState::Denied,
            // Not created yet: writable if the directory is.
            Err(_) => match tokio::fs::metadata(self.parent()).await {
                Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => {
                    PermissionState::Granted
                }
                _ => PermissionState::Denied,
            },
        }
    }

    async fn is_usable(&self) -> bool {
        tokio::fs::metadata(self.parent())
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    async fn read_text(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(None),
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| {
                format!("Failed to read workspace from {}", self.path.display())
            }),
        }
    }

    async fn write_text(&self, contents: &str) -> Result<()> {
        tokio::fs::write(&self.path, contents)
            .await
            .with_context(|| format!("Failed to write workspace to {}", self.path.display()))
    }
}
