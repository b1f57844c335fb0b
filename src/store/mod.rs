//! The workspace store: library, history and the record on screen.
//!
//! All mutation goes through `WorkspaceStore`. Each mutator is one short
//! critical section on the state mutex, so callers observe a transition either
//! entirely or not at all. Storage I/O (load, forced save, autosave, clear) is
//! serialized by a separate async lock so an older snapshot can never be written
//! after a newer one or after a clear.

pub mod notice;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::KeyValueStore;
use crate::config::WorkspaceConfig;
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::file_link::{FileLinkManager, FilePicker};
use crate::models::AnalysisRecord;
use crate::persistence::{DebouncedSaver, SaveSink};
use crate::snapshot::{self, ExportedDocument, WorkspaceSnapshot};
use crate::storage::{
    AppDataBackend, BackendSet, CacheBackend, LinkedFileBackend, SaveReport, StorageBackend,
};

pub use notice::{LogNotifier, Notice, NoticeLevel, Notifier};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOutcome {
    /// Backend the document came from; `None` when nothing was stored yet.
    pub source: Option<&'static str>,
    pub library_len: usize,
    pub history_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub library_len: usize,
    pub history_len: usize,
}

/// Everything the UI needs to render the workspace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceView {
    pub library: Vec<AnalysisRecord>,
    pub history: Vec<AnalysisRecord>,
    pub current: Option<AnalysisRecord>,
    pub last_synced: Option<DateTime<Utc>>,
    pub linked_file: Option<String>,
}

#[derive(Default)]
struct WorkspaceState {
    library: Vec<AnalysisRecord>,
    history: Vec<AnalysisRecord>,
    current: Option<AnalysisRecord>,
    last_synced: Option<DateTime<Utc>>,
    /// Autosave stays disarmed until the first load (or import) settles.
    loaded: bool,
}

impl WorkspaceState {
    fn seed(&mut self, snapshot: WorkspaceSnapshot, history_limit: usize) {
        self.library = snapshot.library;
        self.history = snapshot.history;
        self.history.truncate(history_limit);
        self.last_synced = snapshot.last_synced;
        self.current = None;
    }

    fn reset(&mut self) {
        self.library.clear();
        self.history.clear();
        self.current = None;
        self.last_synced = None;
    }
}

struct StoreShared {
    state: Mutex<WorkspaceState>,
    backends: BackendSet,
    file_link: FileLinkManager,
    notifier: Arc<dyn Notifier>,
    io_lock: tokio::sync::Mutex<()>,
    history_limit: usize,
}

impl StoreShared {
    fn state(&self) -> MutexGuard<'_, WorkspaceState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Writes the current state to every backend. Without `force`, nothing is
    /// written until the store has loaded.
    async fn persist(&self, force: bool) -> WorkspaceResult<Option<SaveReport>> {
        let _io = self.io_lock.lock().await;

        let (library, history) = {
            let state = self.state();
            if !force && !state.loaded {
                return Ok(None);
            }
            (state.library.clone(), state.history.clone())
        };

        let saved_at = Utc::now();
        let document = snapshot::encode(&WorkspaceSnapshot::new(library, history, Some(saved_at)))
            .map_err(WorkspaceError::storage)?;
        let report = self.backends.save(&document, saved_at).await?;

        self.state().last_synced = Some(saved_at);
        self.notifier.saved(&report);
        Ok(Some(report))
    }
}

#[async_trait]
impl SaveSink for StoreShared {
    async fn flush(&self) {
        // Failures are non-fatal: memory keeps the data and the next change retries.
        if let Err(err) = self.persist(false).await {
            log_error!("autosave failed: {err}");
            self.notifier
                .notify(Notice::error(format!("Autosave failed: {err}")));
        }
    }
}

/// Cheaply clonable handle to the process-wide workspace.
#[derive(Clone)]
pub struct WorkspaceStore {
    shared: Arc<StoreShared>,
    autosave: Arc<DebouncedSaver>,
}

impl WorkspaceStore {
    /// Builds the standard backend chain (linked file, cache, app-data file).
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &WorkspaceConfig,
        cache: Arc<dyn KeyValueStore>,
        picker: Arc<dyn FilePicker>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let file_link = FileLinkManager::new(picker);
        let backends: Vec<Arc<dyn StorageBackend>> = vec![
            Arc::new(LinkedFileBackend::new(file_link.clone())),
            Arc::new(CacheBackend::new(cache, config.cache_key.clone())),
            Arc::new(AppDataBackend::new(
                config.app_data_dir.clone(),
                &config.app_data_file_name,
            )),
        ];
        Self::from_parts(config, BackendSet::new(backends), file_link, notifier)
    }

    pub fn from_parts(
        config: &WorkspaceConfig,
        backends: BackendSet,
        file_link: FileLinkManager,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let shared = Arc::new(StoreShared {
            state: Mutex::new(WorkspaceState::default()),
            backends,
            file_link,
            notifier,
            io_lock: tokio::sync::Mutex::new(()),
            history_limit: config.history_limit,
        });
        let autosave = DebouncedSaver::spawn(config.autosave_debounce, shared.clone());

        Self {
            shared,
            autosave: Arc::new(autosave),
        }
    }

    fn state(&self) -> MutexGuard<'_, WorkspaceState> {
        self.shared.state()
    }

    fn notify(&self, notice: Notice) {
        self.shared.notifier.notify(notice);
    }

    fn schedule_autosave(&self, loaded: bool) {
        if loaded {
            self.autosave.touch();
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn library(&self) -> Vec<AnalysisRecord> {
        self.state().library.clone()
    }

    pub fn history(&self) -> Vec<AnalysisRecord> {
        self.state().history.clone()
    }

    pub fn current(&self) -> Option<AnalysisRecord> {
        self.state().current.clone()
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.state().last_synced
    }

    pub fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    pub fn linked_file_name(&self) -> Option<String> {
        self.shared.file_link.current_name()
    }

    pub fn view(&self) -> WorkspaceView {
        let linked_file = self.linked_file_name();
        let state = self.state();
        WorkspaceView {
            library: state.library.clone(),
            history: state.history.clone(),
            current: state.current.clone(),
            last_synced: state.last_synced,
            linked_file,
        }
    }

    // ------------------------------------------------------------------
    // Startup
    // ------------------------------------------------------------------

    /// Seeds the store from the highest-priority backend holding a document.
    /// On any failure the store starts empty and the error is returned. Either
    /// way autosave is armed afterwards.
    pub async fn load(&self) -> WorkspaceResult<LoadOutcome> {
        let _io = self.shared.io_lock.lock().await;

        let decoded = match self.shared.backends.load().await {
            Ok(None) => Ok(None),
            Ok(Some((source, text))) => snapshot::decode(&text)
                .map(|snapshot| Some((source, snapshot)))
                .map_err(|err| WorkspaceError::corrupt(format!("{source}: {err}"))),
            Err(err) => Err(WorkspaceError::storage(err)),
        };

        let mut state = self.state();
        state.loaded = true;

        match decoded {
            Ok(Some((source, snapshot))) => {
                state.seed(snapshot, self.shared.history_limit);
                log_info!(
                    "loaded {} library and {} history entries from {source}",
                    state.library.len(),
                    state.history.len()
                );
                Ok(LoadOutcome {
                    source: Some(source),
                    library_len: state.library.len(),
                    history_len: state.history.len(),
                })
            }
            Ok(None) => {
                log_info!("no stored workspace found; starting fresh");
                let outcome = LoadOutcome {
                    source: None,
                    library_len: state.library.len(),
                    history_len: state.history.len(),
                };
                drop(state);

                // Work done before the load is the baseline now; persist it.
                if outcome.library_len > 0 || outcome.history_len > 0 {
                    self.autosave.touch();
                }
                Ok(outcome)
            }
            Err(err) => {
                state.reset();
                drop(state);
                log_error!("failed to load workspace: {err}");
                self.notify(Notice::error("Could not load local data"));
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Appends `record` unless a record with the same id is already saved.
    pub fn add_to_library(&self, record: AnalysisRecord) -> AddOutcome {
        let (outcome, loaded) = {
            let mut state = self.state();
            if state.library.iter().any(|item| item.id == record.id) {
                (AddOutcome::AlreadyPresent, state.loaded)
            } else {
                state.library.push(record);
                (AddOutcome::Added, state.loaded)
            }
        };

        match outcome {
            AddOutcome::Added => {
                self.notify(Notice::success("Saved to library"));
                self.schedule_autosave(loaded);
            }
            AddOutcome::AlreadyPresent => {
                self.notify(Notice::info("This item is already in your library"));
            }
        }
        outcome
    }

    /// Replaces every entry sharing `record.id` (library, history and the
    /// current record). Returns false if no entry matched.
    pub fn update_record(&self, record: AnalysisRecord) -> bool {
        let (collections_changed, current_changed, loaded) = {
            let mut state = self.state();
            let mut collections_changed = false;

            if let Some(item) = state.library.iter_mut().find(|item| item.id == record.id) {
                *item = record.clone();
                collections_changed = true;
            }
            if let Some(item) = state.history.iter_mut().find(|item| item.id == record.id) {
                *item = record.clone();
                collections_changed = true;
            }

            let current_changed = match state.current.as_mut() {
                Some(current) if current.id == record.id => {
                    *current = record;
                    true
                }
                _ => false,
            };

            (collections_changed, current_changed, state.loaded)
        };

        if collections_changed {
            self.schedule_autosave(loaded);
        }
        collections_changed || current_changed
    }

    /// Removes the record from the library only. Returns false if absent.
    pub fn delete_from_library(&self, id: &str) -> bool {
        let (removed, loaded) = {
            let mut state = self.state();
            let before = state.library.len();
            state.library.retain(|item| item.id != id);
            (state.library.len() != before, state.loaded)
        };

        if removed {
            self.notify(Notice::success("Deleted from library"));
            self.schedule_autosave(loaded);
        }
        removed
    }

    /// Puts a fresh analysis at the head of the history and shows it.
    pub fn record_analysis(&self, record: AnalysisRecord) {
        let loaded = {
            let mut state = self.state();
            state.history.retain(|item| item.id != record.id);
            state.history.insert(0, record.clone());
            let limit = self.shared.history_limit;
            state.history.truncate(limit);
            state.current = Some(record);
            state.loaded
        };
        self.schedule_autosave(loaded);
    }

    /// Selects the record on screen. Not persisted.
    pub fn set_current(&self, record: Option<AnalysisRecord>) {
        self.state().current = record;
    }

    /// Empties both collections, drops the file link and clears every backend
    /// immediately.
    pub async fn clear_all(&self) -> WorkspaceResult<()> {
        let _io = self.shared.io_lock.lock().await;

        self.state().reset();
        self.shared.file_link.clear();
        log_warn!("workspace cleared");

        self.shared.backends.clear().await
    }

    // ------------------------------------------------------------------
    // Durability
    // ------------------------------------------------------------------

    /// Asks the user for a workspace file and, once bound, writes the whole
    /// workspace to it straight away. `Ok(None)` if the user cancelled.
    pub async fn link_file(&self) -> WorkspaceResult<Option<String>> {
        let Some(name) = self.shared.file_link.select_workspace_file().await? else {
            return Ok(None);
        };

        self.save_now().await?;
        self.notify(Notice::success(format!("Linked to file: {name}")));
        Ok(Some(name))
    }

    /// Saves immediately, bypassing the debounce.
    pub async fn save_now(&self) -> WorkspaceResult<SaveReport> {
        match self.shared.persist(true).await? {
            Some(report) => Ok(report),
            None => Err(WorkspaceError::Storage("forced save was not performed".into())),
        }
    }

    pub fn export_snapshot(&self) -> WorkspaceResult<ExportedDocument> {
        let now = Utc::now();
        let snapshot = {
            let state = self.state();
            WorkspaceSnapshot::new(state.library.clone(), state.history.clone(), Some(now))
        };
        let contents = snapshot::encode(&snapshot).map_err(WorkspaceError::storage)?;

        Ok(ExportedDocument {
            file_name: snapshot::export_file_name(now.date_naive()),
            contents,
        })
    }

    /// Replaces both collections with the document's contents. Nothing changes
    /// if the document is invalid.
    pub fn import_snapshot(&self, document: &str) -> WorkspaceResult<ImportSummary> {
        let snapshot = match snapshot::decode(document) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.notify(Notice::error(format!("Import failed: {err}")));
                return Err(WorkspaceError::invalid(err.to_string()));
            }
        };

        let summary = {
            let mut state = self.state();
            state.library = snapshot.library;
            state.history = snapshot.history;
            let limit = self.shared.history_limit;
            state.history.truncate(limit);
            state.loaded = true;
            ImportSummary {
                library_len: state.library.len(),
                history_len: state.history.len(),
            }
        };

        self.notify(Notice::success("Workspace restored"));
        self.schedule_autosave(true);
        Ok(summary)
    }

    pub async fn import_file(&self, path: &Path) -> WorkspaceResult<ImportSummary> {
        let document = tokio::fs::read_to_string(path).await?;
        self.import_snapshot(&document)
    }

    /// Flushes a pending autosave and stops the autosave worker.
    pub async fn shutdown(&self) {
        self.autosave.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryKeyValueStore;
    use crate::file_link::test_support::{ScriptedHandle, ScriptedPicker};
    use crate::file_link::NoFilePicker;
    use crate::models::{AnalysisType, UsageExample};
    use crate::storage::test_support::RecordingBackend;
    use crate::storage::BackendStatus;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<Notice>>,
    }

    impl RecordingNotifier {
        fn levels(&self) -> Vec<NoticeLevel> {
            self.notices.lock().unwrap().iter().map(|n| n.level).collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }
    }

    fn record(term: &str) -> AnalysisRecord {
        AnalysisRecord::new(term, AnalysisType::Word)
    }

    fn store_with(
        backends: Vec<Arc<dyn StorageBackend>>,
        file_link: FileLinkManager,
    ) -> (WorkspaceStore, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = WorkspaceStore::from_parts(
            &WorkspaceConfig::default(),
            BackendSet::new(backends),
            file_link,
            notifier.clone(),
        );
        (store, notifier)
    }

    fn recording_store() -> (WorkspaceStore, Arc<RecordingBackend>, Arc<RecordingNotifier>) {
        let backend = RecordingBackend::new("cache");
        let (store, notifier) = store_with(
            vec![backend.clone()],
            FileLinkManager::new(Arc::new(NoFilePicker)),
        );
        (store, backend, notifier)
    }

    fn cache_store(kv: Arc<MemoryKeyValueStore>) -> WorkspaceStore {
        WorkspaceStore::new(
            &WorkspaceConfig::default(),
            kv,
            Arc::new(NoFilePicker),
            Arc::new(LogNotifier),
        )
    }

    #[tokio::test]
    async fn test_add_to_library_is_idempotent_by_id() {
        let (store, _, notifier) = recording_store();
        let a = record("alpha");
        let b = record("beta");

        assert_eq!(store.add_to_library(a.clone()), AddOutcome::Added);
        assert_eq!(store.add_to_library(b.clone()), AddOutcome::Added);
        assert_eq!(store.add_to_library(a.clone()), AddOutcome::AlreadyPresent);

        let mut renamed = a.clone();
        renamed.term = "alpha prime".into();
        assert_eq!(store.add_to_library(renamed), AddOutcome::AlreadyPresent);

        let ids: Vec<_> = store.library().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(
            notifier.levels(),
            vec![NoticeLevel::Success, NoticeLevel::Success, NoticeLevel::Info, NoticeLevel::Info]
        );
    }

    #[tokio::test]
    async fn test_history_keeps_latest_hundred_newest_first() {
        let (store, _, _) = recording_store();
        let records: Vec<_> = (0..101).map(|i| record(&format!("term-{i}"))).collect();
        for r in &records {
            store.record_analysis(r.clone());
        }

        let history = store.history();
        assert_eq!(history.len(), 100);
        let expected: Vec<_> = records.iter().rev().take(100).map(|r| r.id.clone()).collect();
        let actual: Vec<_> = history.iter().map(|r| r.id.clone()).collect();
        assert_eq!(actual, expected);
        assert_eq!(store.current().map(|r| r.id), Some(records[100].id.clone()));
    }

    #[tokio::test]
    async fn test_recording_same_id_moves_it_to_front() {
        let (store, _, _) = recording_store();
        let a = record("a");
        let b = record("b");
        store.record_analysis(a.clone());
        store.record_analysis(b.clone());
        store.record_analysis(a.clone());

        let ids: Vec<_> = store.history().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_update_record_touches_every_copy_and_nothing_else() {
        let (store, _, _) = recording_store();
        let target = record("target");
        let other = record("other");

        store.add_to_library(target.clone());
        store.add_to_library(other.clone());
        store.record_analysis(other.clone());
        store.record_analysis(target.clone());

        let mut edited = target.clone();
        edited.add_tag("edited");
        edited.add_usage_example(UsageExample {
            category: "daily".into(),
            en: "An example.".into(),
            cn: "一个例子。".into(),
        });
        assert!(store.update_record(edited.clone()));

        let library = store.library();
        let history = store.history();
        assert_eq!(library.iter().find(|r| r.id == target.id), Some(&edited));
        assert_eq!(history.iter().find(|r| r.id == target.id), Some(&edited));
        assert_eq!(store.current(), Some(edited));
        assert_eq!(library.iter().find(|r| r.id == other.id), Some(&other));
        assert_eq!(history.iter().find(|r| r.id == other.id), Some(&other));
    }

    #[tokio::test]
    async fn test_update_unknown_record_is_a_no_op() {
        let (store, _, _) = recording_store();
        let kept = record("kept");
        store.add_to_library(kept.clone());

        assert!(!store.update_record(record("stranger")));
        assert_eq!(store.library(), vec![kept]);
        assert!(store.history().is_empty());
    }

    #[tokio::test]
    async fn test_delete_only_affects_library() {
        let (store, _, _) = recording_store();
        let r = record("gone");
        store.add_to_library(r.clone());
        store.record_analysis(r.clone());

        assert!(store.delete_from_library(&r.id));
        assert!(!store.delete_from_library(&r.id));
        assert!(store.library().is_empty());
        assert_eq!(store.history(), vec![r]);
    }

    #[tokio::test]
    async fn test_export_then_import_round_trips_collections() {
        let (store, _, _) = recording_store();
        let mut saved = record("saved");
        saved.root_form = Some("save".into());
        saved.add_tag("verbs");
        store.add_to_library(saved.clone());
        store.record_analysis(saved);
        store.record_analysis(record("fresh"));

        let library = store.library();
        let history = store.history();

        let exported = store.export_snapshot().unwrap();
        assert!(exported.file_name.starts_with("smartlex_workspace_"));
        assert!(exported.file_name.ends_with(".lex"));

        let summary = store.import_snapshot(&exported.contents).unwrap();
        assert_eq!(summary.library_len, 1);
        assert_eq!(summary.history_len, 2);
        assert_eq!(store.library(), library);
        assert_eq!(store.history(), history);
    }

    #[tokio::test]
    async fn test_import_without_library_field_changes_nothing() {
        let (store, _, _) = recording_store();
        let kept = record("kept");
        store.add_to_library(kept.clone());
        store.record_analysis(kept.clone());

        let err = store
            .import_snapshot(r#"{"version":"1.1.0","history":[]}"#)
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidDocument(_)));
        assert_eq!(store.library(), vec![kept.clone()]);
        assert_eq!(store.history(), vec![kept]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_mutations_saves_once_with_latest_state() {
        let (store, backend, _) = recording_store();
        store.load().await.unwrap();

        let records: Vec<_> = (0..10).map(|i| record(&format!("burst-{i}"))).collect();
        for r in &records {
            store.record_analysis(r.clone());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(backend.write_count(), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(backend.write_count(), 1);

        let saved = snapshot::decode(&backend.last().unwrap()).unwrap();
        assert_eq!(saved.history.len(), 10);
        assert_eq!(saved.history[0].id, records[9].id);
        assert!(store.last_synced().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_autosave_before_load() {
        let (store, backend, _) = recording_store();
        store.record_analysis(record("early"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.write_count(), 0);

        // Nothing stored yet, so the early record survives loading.
        let outcome = store.load().await.unwrap();
        assert_eq!(outcome.source, None);
        assert_eq!(store.history().len(), 1);

        store.record_analysis(record("later"));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_load_work_is_saved_when_nothing_was_stored() {
        let (store, backend, _) = recording_store();
        let early = record("early");
        store.record_analysis(early.clone());

        let outcome = store.load().await.unwrap();
        assert_eq!(outcome.source, None);
        assert_eq!(outcome.history_len, 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        store.shutdown().await;
        assert_eq!(backend.write_count(), 1);

        let saved = snapshot::decode(&backend.last().unwrap()).unwrap();
        assert_eq!(saved.history, vec![early]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_load_schedules_nothing() {
        let (store, backend, _) = recording_store();
        store.load().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        store.shutdown().await;
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_updating_only_the_current_record_is_not_saved() {
        let (store, backend, _) = recording_store();
        store.load().await.unwrap();
        let shown = record("shown");
        store.set_current(Some(shown.clone()));

        let mut edited = shown.clone();
        edited.add_tag("draft");
        assert!(store.update_record(edited.clone()));
        assert_eq!(store.current(), Some(edited));
        assert!(store.library().is_empty());
        assert!(store.history().is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.write_count(), 0);
    }

    fn capped_store(limit: usize) -> (WorkspaceStore, Arc<RecordingBackend>) {
        let config = WorkspaceConfig {
            history_limit: limit,
            ..WorkspaceConfig::default()
        };
        let backend = RecordingBackend::new("cache");
        let store = WorkspaceStore::from_parts(
            &config,
            BackendSet::new(vec![backend.clone()]),
            FileLinkManager::new(Arc::new(NoFilePicker)),
            Arc::new(LogNotifier),
        );
        (store, backend)
    }

    fn oversized_document(len: usize) -> (String, Vec<AnalysisRecord>) {
        let history: Vec<_> = (0..len).map(|i| record(&format!("old-{i}"))).collect();
        let document =
            snapshot::encode(&WorkspaceSnapshot::new(Vec::new(), history.clone(), None)).unwrap();
        (document, history)
    }

    #[tokio::test]
    async fn test_import_truncates_history_to_limit() {
        let (store, _) = capped_store(3);
        let (document, history) = oversized_document(5);

        let summary = store.import_snapshot(&document).unwrap();
        assert_eq!(summary.history_len, 3);
        assert_eq!(store.history(), history[..3].to_vec());
    }

    #[tokio::test]
    async fn test_load_truncates_history_to_limit() {
        let (store, backend) = capped_store(3);
        let (document, history) = oversized_document(5);
        *backend.last.lock().unwrap() = Some(document);

        let outcome = store.load().await.unwrap();
        assert_eq!(outcome.source, Some("cache"));
        assert_eq!(outcome.history_len, 3);
        assert_eq!(store.history(), history[..3].to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_op_mutations_do_not_schedule_saves() {
        let (store, backend, _) = recording_store();
        store.load().await.unwrap();
        let r = record("once");
        store.add_to_library(r.clone());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(backend.write_count(), 1);

        store.add_to_library(r);
        store.delete_from_library("missing");
        store.update_record(record("missing"));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_restart_restores_then_clear_leaves_nothing() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let saved = record("persisted");

        let first = cache_store(kv.clone());
        first.load().await.unwrap();
        first.add_to_library(saved.clone());
        first.record_analysis(saved.clone());
        first.save_now().await.unwrap();
        first.shutdown().await;

        let second = cache_store(kv.clone());
        let outcome = second.load().await.unwrap();
        assert_eq!(outcome.source, Some("cache"));
        assert_eq!(second.library(), vec![saved.clone()]);
        assert_eq!(second.history(), vec![saved]);
        assert!(second.last_synced().is_some());

        second.clear_all().await.unwrap();
        assert!(second.library().is_empty());
        assert!(second.current().is_none());

        let third = cache_store(kv);
        third.load().await.unwrap();
        assert!(third.library().is_empty());
        assert!(third.history().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_document_starts_empty_and_reports() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set("smartlex_workspace", "{ not json").await.unwrap();

        let store = cache_store(kv);
        store.record_analysis(record("pre-load"));
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, WorkspaceError::CorruptSnapshot(_)));
        assert!(store.history().is_empty());
        assert!(store.is_loaded());
    }

    #[tokio::test]
    async fn test_denied_linked_file_does_not_fail_save() {
        let handle = ScriptedHandle::new("shared.lex");
        let link = FileLinkManager::new(Arc::new(NoFilePicker));
        link.bind(handle.clone()).await;
        handle.deny();

        let cache = RecordingBackend::new("cache");
        let (store, _) = store_with(
            vec![Arc::new(LinkedFileBackend::new(link.clone())), cache.clone()],
            link,
        );
        store.load().await.unwrap();
        store.add_to_library(record("kept"));

        let report = store.save_now().await.unwrap();
        assert!(matches!(
            report.status_of("linked-file"),
            Some(BackendStatus::Skipped(_))
        ));
        assert_eq!(report.status_of("cache"), Some(&BackendStatus::Written));
        assert_eq!(cache.write_count(), 1);
        assert_eq!(handle.contents(), None);
    }

    #[tokio::test]
    async fn test_total_save_failure_keeps_memory() {
        let (store, backend, _) = recording_store();
        store.load().await.unwrap();
        store.add_to_library(record("kept"));
        backend.fail.store(true, Ordering::SeqCst);

        let err = store.save_now().await.unwrap_err();
        assert!(matches!(err, WorkspaceError::AllBackendsFailed(_)));
        assert_eq!(store.library().len(), 1);
        assert!(store.last_synced().is_none());
    }

    #[tokio::test]
    async fn test_link_file_forces_save_into_linked_file() {
        let handle = ScriptedHandle::new("mine.lex");
        let link = FileLinkManager::new(Arc::new(ScriptedPicker {
            handle: Some(handle.clone()),
        }));
        let cache = RecordingBackend::new("cache");
        let (store, notifier) = store_with(
            vec![Arc::new(LinkedFileBackend::new(link.clone())), cache],
            link,
        );
        store.load().await.unwrap();
        let r = record("linked");
        store.add_to_library(r.clone());

        let name = store.link_file().await.unwrap();
        assert_eq!(name.as_deref(), Some("mine.lex"));
        assert_eq!(store.linked_file_name().as_deref(), Some("mine.lex"));

        let written = snapshot::decode(&handle.contents().unwrap()).unwrap();
        assert_eq!(written.library, vec![r]);
        assert_eq!(notifier.levels().last(), Some(&NoticeLevel::Success));

        store.clear_all().await.unwrap();
        assert_eq!(store.linked_file_name(), None);
    }

    #[tokio::test]
    async fn test_cancelled_link_saves_nothing() {
        let link = FileLinkManager::new(Arc::new(ScriptedPicker { handle: None }));
        let cache = RecordingBackend::new("cache");
        let (store, _) = store_with(vec![cache.clone()], link);

        assert_eq!(store.link_file().await.unwrap(), None);
        assert_eq!(cache.write_count(), 0);
    }

    #[tokio::test]
    async fn test_link_without_picker_is_unsupported() {
        let (store, _, _) = recording_store();
        let err = store.link_file().await.unwrap_err();
        assert!(matches!(err, WorkspaceError::UnsupportedEnvironment(_)));
    }

    #[tokio::test]
    async fn test_set_current_and_view() {
        let (store, _, _) = recording_store();
        let r = record("shown");
        store.set_current(Some(r.clone()));

        let view = store.view();
        assert_eq!(view.current, Some(r));
        assert!(view.library.is_empty());
        assert_eq!(view.linked_file, None);

        store.set_current(None);
        assert!(store.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_autosave() {
        let (store, backend, _) = recording_store();
        store.load().await.unwrap();
        store.add_to_library(record("late"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        store.shutdown().await;
        assert_eq!(backend.write_count(), 1);
    }
}
