//! Seam for the external analysis collaborator.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::AnalysisRecord;
use crate::store::WorkspaceStore;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Produces a structured analysis of `term` as used in `context`.
    /// `image` is an optional base64 data URL giving visual context.
    async fn analyze(
        &self,
        term: &str,
        context: &str,
        image: Option<String>,
    ) -> Result<AnalysisRecord>;

    async fn chat(&self, message: &str, current: Option<&AnalysisRecord>) -> Result<String>;
}

impl WorkspaceStore {
    /// Runs an analysis and records the result. Engine errors are returned
    /// as-is and leave the store untouched.
    pub async fn analyze_term(
        &self,
        engine: &dyn AnalysisEngine,
        term: &str,
        context: &str,
        image: Option<String>,
    ) -> Result<AnalysisRecord> {
        match engine.analyze(term, context, image).await {
            Ok(record) => {
                self.record_analysis(record.clone());
                Ok(record)
            }
            Err(err) => {
                log_warn!("analysis of '{term}' failed: {err:#}");
                Err(err)
            }
        }
    }
}
