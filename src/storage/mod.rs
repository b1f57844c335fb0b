//! Storage backends and the orchestrator that fans a snapshot out to them.
//!
//! Each backend reports whether it can be used in the current environment; the
//! orchestrator only ever iterates the available subset. A failing backend is
//! logged and skipped, never allowed to abort its siblings.

pub mod app_data;
pub mod cache;
pub mod linked_file;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{WorkspaceError, WorkspaceResult};

pub use app_data::AppDataBackend;
pub use cache::CacheBackend;
pub use linked_file::LinkedFileBackend;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The backend chose not to write this cycle (e.g. permission not granted).
    Skipped(String),
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// Read errors from an authoritative backend are surfaced instead of
    /// falling through to the next backend.
    fn authoritative_reads(&self) -> bool {
        false
    }

    async fn write(&self, document: &str) -> Result<WriteOutcome>;

    async fn read(&self) -> Result<Option<String>>;

    async fn clear(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum BackendStatus {
    Written,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendOutcome {
    pub backend: &'static str,
    pub status: BackendStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub saved_at: DateTime<Utc>,
    pub outcomes: Vec<BackendOutcome>,
}

impl SaveReport {
    pub fn written(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == BackendStatus::Written)
            .map(|outcome| outcome.backend)
    }

    pub fn status_of(&self, backend: &str) -> Option<&BackendStatus> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.backend == backend)
            .map(|outcome| &outcome.status)
    }
}

/// Backends in priority order: linked file, cache, app-data file.
#[derive(Clone)]
pub struct BackendSet {
    backends: Vec<Arc<dyn StorageBackend>>,
}

impl BackendSet {
    pub fn new(backends: Vec<Arc<dyn StorageBackend>>) -> Self {
        Self { backends }
    }

    fn available(&self) -> impl Iterator<Item = &Arc<dyn StorageBackend>> {
        self.backends.iter().filter(|backend| backend.is_available())
    }

    /// Writes `document` to every available backend. Succeeds if at least one
    /// backend wrote it.
    pub async fn save(&self, document: &str, saved_at: DateTime<Utc>) -> WorkspaceResult<SaveReport> {
        let mut outcomes = Vec::new();

        for backend in self.available() {
            let status = match backend.write(document).await {
                Ok(WriteOutcome::Written) => BackendStatus::Written,
                Ok(WriteOutcome::Skipped(reason)) => {
                    log_warn!("{} backend skipped this save: {reason}", backend.name());
                    BackendStatus::Skipped(reason)
                }
                Err(err) => {
                    log_error!("{} backend failed to save: {err:#}", backend.name());
                    BackendStatus::Failed(format!("{err:#}"))
                }
            };
            outcomes.push(BackendOutcome {
                backend: backend.name(),
                status,
            });
        }

        let report = SaveReport { saved_at, outcomes };
        if report.written().next().is_some() {
            log_info!(
                "workspace saved to {}",
                report.written().collect::<Vec<_>>().join(", ")
            );
            return Ok(report);
        }

        let reasons = report
            .outcomes
            .into_iter()
            .map(|outcome| match outcome.status {
                BackendStatus::Failed(reason) | BackendStatus::Skipped(reason) => {
                    format!("{}: {reason}", outcome.backend)
                }
                BackendStatus::Written => outcome.backend.to_string(),
            })
            .collect::<Vec<_>>();
        let reasons = if reasons.is_empty() {
            vec!["no storage backend available".to_string()]
        } else {
            reasons
        };
        Err(WorkspaceError::AllBackendsFailed(reasons))
    }

    /// Reads the first document found, in priority order.
    pub async fn load(&self) -> Result<Option<(&'static str, String)>> {
        for backend in self.available() {
            match backend.read().await {
                Ok(Some(document)) => {
                    log_info!("workspace loaded from {} backend", backend.name());
                    return Ok(Some((backend.name(), document)));
                }
                Ok(None) => continue,
                Err(err) if backend.authoritative_reads() => return Err(err),
                Err(err) => {
                    log_warn!("{} backend could not be read: {err:#}", backend.name());
                }
            }
        }
        Ok(None)
    }

    /// Clears every available backend, attempting all of them even if one
    /// fails.
    pub async fn clear(&self) -> WorkspaceResult<()> {
        let mut failures = Vec::new();
        for backend in self.available() {
            if let Err(err) = backend.clear().await {
                log_error!("{} backend failed to clear: {err:#}", backend.name());
                failures.push(format!("{}: {err:#}", backend.name()));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(WorkspaceError::Storage(failures.join("; ")))
        }
    }
}
