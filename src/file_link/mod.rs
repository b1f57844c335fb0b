//! Binding between the live workspace and one user-chosen file.
//!
//! The link is held in memory only; every session has to pick the file again.

pub mod handle;

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::error::{WorkspaceError, WorkspaceResult};

pub use handle::PathFileHandle;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

#[async_trait]
pub trait FileHandle: Send + Sync {
    fn name(&self) -> String;

    /// Current read-write permission. Re-queried before every write.
    async fn query_permission(&self) -> PermissionState;

    /// False once the handle can no longer reach its file at all.
    async fn is_usable(&self) -> bool {
        true
    }

    /// `Ok(None)` when the file does not exist yet or is blank.
    async fn read_text(&self) -> Result<Option<String>>;

    async fn write_text(&self, contents: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PickerOptions {
    pub suggested_name: String,
    pub description: String,
    pub extensions: Vec<String>,
    pub mime_type: String,
}

impl Default for PickerOptions {
    fn default() -> Self {
        Self {
            suggested_name: "my_smartlex_workspace.lex".into(),
            description: "SmartLex Workspace File".into(),
            extensions: vec!["lex".into()],
            mime_type: "application/json".into(),
        }
    }
}

#[async_trait]
pub trait FilePicker: Send + Sync {
    fn is_supported(&self) -> bool;

    /// `Ok(None)` means the user dismissed the dialog.
    async fn pick_save_file(&self, options: &PickerOptions) -> Result<Option<Arc<dyn FileHandle>>>;
}

/// Picker for hosts without any file dialog.
pub struct NoFilePicker;

#[async_trait]
impl FilePicker for NoFilePicker {
    fn is_supported(&self) -> bool {
        false
    }

    async fn pick_save_file(&self, _options: &PickerOptions) -> Result<Option<Arc<dyn FileHandle>>> {
        Ok(None)
    }
}

#[derive(Clone)]
pub struct FileLink {
    pub name: String,
    pub handle: Arc<dyn FileHandle>,
    pub permission: PermissionState,
}

#[derive(Clone)]
pub struct FileLinkManager {
    picker: Arc<dyn FilePicker>,
    link: Arc<Mutex<Option<FileLink>>>,
    options: PickerOptions,
}

impl FileLinkManager {
    pub fn new(picker: Arc<dyn FilePicker>) -> Self {
        Self {
            picker,
            link: Arc::new(Mutex::new(None)),
            options: PickerOptions::default(),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Option<FileLink>> {
        match self.link.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Prompts for a target file and binds it. Returns the display name, or
    /// `None` if the user cancelled.
    pub async fn select_workspace_file(&self) -> WorkspaceResult<Option<String>> {
        if !self.picker.is_supported() {
            return Err(WorkspaceError::unsupported(
                "this environment cannot choose a local workspace file",
            ));
        }

        let picked = self
            .picker
            .pick_save_file(&self.options)
            .await
            .map_err(WorkspaceError::storage)?;

        match picked {
            Some(handle) => Ok(Some(self.bind(handle).await)),
            None => {
                log_info!("workspace file selection cancelled");
                Ok(None)
            }
        }
    }

    /// Binds an already-acquired handle, replacing any previous link.
    pub async fn bind(&self, handle: Arc<dyn FileHandle>) -> String {
        let permission = handle.query_permission().await;
        let name = handle.name();
        *self.guard() = Some(FileLink {
            name: name.clone(),
            handle,
            permission,
        });
        log_info!("linked workspace file {name} ({permission:?})");
        name
    }

    pub fn has_link(&self) -> bool {
        self.guard().is_some()
    }

    pub fn current_name(&self) -> Option<String> {
        self.guard().as_ref().map(|link| link.name.clone())
    }

    pub fn permission(&self) -> Option<PermissionState> {
        self.guard().as_ref().map(|link| link.permission)
    }

    pub fn handle(&self) -> Option<Arc<dyn FileHandle>> {
        self.guard().as_ref().map(|link| link.handle.clone())
    }

    pub fn clear(&self) {
        if let Some(link) = self.guard().take() {
            log_info!("unlinked workspace file {}", link.name);
        }
    }

    /// Re-queries permission on the bound handle and records the result.
    /// Returns `None` when nothing is linked. A handle that can no longer reach
    /// its file is dropped.
    pub async fn verify_permission(&self) -> Option<(Arc<dyn FileHandle>, PermissionState)> {
        let handle = self.handle()?;

        if !handle.is_usable().await {
            log_warn!("linked file {} is no longer reachable; unlinking", handle.name());
            let mut guard = self.guard();
            if guard
                .as_ref()
                .is_some_and(|link| Arc::ptr_eq(&link.handle, &handle))
            {
                *guard = None;
            }
            return None;
        }

        let permission = handle.query_permission().await;
        if let Some(link) = self.guard().as_mut() {
            if Arc::ptr_eq(&link.handle, &handle) {
                link.permission = permission;
            }
        }
        Some((handle, permission))
    }
}
