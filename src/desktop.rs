//! Tauri-side implementations of the picker and notifier seams.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tauri::{AppHandle, Emitter};
use tauri_plugin_dialog::DialogExt;
use tokio::sync::oneshot;

use crate::file_link::{FileHandle, FilePicker, PathFileHandle, PickerOptions};
use crate::storage::SaveReport;
use crate::store::{Notice, Notifier};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const NOTICE_EVENT: &str = "workspace-notice";
pub const SAVED_EVENT: &str = "workspace-saved";

/// Native save dialog. The chosen path stays linked for this session only.
pub struct DialogFilePicker {
    app: AppHandle,
}

impl DialogFilePicker {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

#[async_trait]
impl FilePicker for DialogFilePicker {
    fn is_supported(&self) -> bool {
        true
    }

    async fn pick_save_file(&self, options: &PickerOptions) -> Result<Option<Arc<dyn FileHandle>>> {
        let (tx, rx) = oneshot::channel();
        let extensions: Vec<&str> = options.extensions.iter().map(String::as_str).collect();

        self.app
            .dialog()
            .file()
            .set_file_name(&options.suggested_name)
            .add_filter(&options.description, &extensions)
            .save_file(move |path| {
                let _ = tx.send(path);
            });

        let picked = rx.await.context("save dialog closed without a result")?;
        let Some(picked) = picked else {
            return Ok(None);
        };

        let path = picked
            .into_path()
            .map_err(|err| anyhow!("unsupported file location: {err}"))?;
        Ok(Some(Arc::new(PathFileHandle::new(path))))
    }
}

/// Forwards notices and save reports to the webview as events.
pub struct TauriNotifier {
    app: AppHandle,
}

impl TauriNotifier {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl Notifier for TauriNotifier {
    fn notify(&self, notice: Notice) {
        if let Err(err) = self.app.emit(NOTICE_EVENT, &notice) {
            log_warn!("failed to emit {NOTICE_EVENT}: {err}");
        }
    }

    fn saved(&self, report: &SaveReport) {
        if let Err(err) = self.app.emit(SAVED_EVENT, report) {
            log_warn!("failed to emit {SAVED_EVENT}: {err}");
        }
    }
}
