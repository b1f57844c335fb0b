use anyhow::Result;
use async_trait::async_trait;

use crate::error::WorkspaceError;
use crate::file_link::{FileLinkManager, PermissionState};
use crate::snapshot::{self, WorkspaceSnapshot};

use super::{StorageBackend, WriteOutcome};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Writes through the user's linked file. Active only while a link is bound.
pub struct LinkedFileBackend {
    link: FileLinkManager,
}

impl LinkedFileBackend {
    pub fn new(link: FileLinkManager) -> Self {
        Self { link }
    }
}

#[async_trait]
impl StorageBackend for LinkedFileBackend {
    fn name(&self) -> &'static str {
        "linked-file"
    }

    fn is_available(&self) -> bool {
        self.link.has_link()
    }

    fn authoritative_reads(&self) -> bool {
        true
    }

    async fn write(&self, document: &str) -> Result<WriteOutcome> {
        let Some((handle, permission)) = self.link.verify_permission().await else {
            return Ok(WriteOutcome::Skipped("linked file is no longer available".into()));
        };

        if permission != PermissionState::Granted {
            log_warn!(
                "write permission for {} is {permission:?}; skipping linked file this cycle",
                handle.name()
            );
            let denied = WorkspaceError::PermissionDenied(handle.name());
            return Ok(WriteOutcome::Skipped(denied.to_string()));
        }

        handle.write_text(document).await?;
        Ok(WriteOutcome::Written)
    }

    async fn read(&self) -> Result<Option<String>> {
        match self.link.handle() {
            Some(handle) => handle.read_text().await,
            None => Ok(None),
        }
    }

    async fn clear(&self) -> Result<()> {
        let empty = snapshot::encode(&WorkspaceSnapshot::empty())?;
        if let WriteOutcome::Skipped(reason) = self.write(&empty).await? {
            log_warn!("linked file was not cleared: {reason}");
        }
        Ok(())
    }
}
