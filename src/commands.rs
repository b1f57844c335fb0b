use std::path::PathBuf;

use tauri::State;

use crate::{
    models::AnalysisRecord,
    snapshot::ExportedDocument,
    storage::SaveReport,
    store::{AddOutcome, ImportSummary, LoadOutcome, WorkspaceView},
    AppState,
};

#[tauri::command]
pub fn get_workspace(state: State<'_, AppState>) -> Result<WorkspaceView, String> {
    Ok(state.store.view())
}

#[tauri::command]
pub async fn load_workspace(state: State<'_, AppState>) -> Result<LoadOutcome, String> {
    state.store.load().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn add_to_library(
    state: State<'_, AppState>,
    record: AnalysisRecord,
) -> Result<AddOutcome, String> {
    Ok(state.store.add_to_library(record))
}

#[tauri::command]
pub fn update_record(state: State<'_, AppState>, record: AnalysisRecord) -> Result<bool, String> {
    Ok(state.store.update_record(record))
}

#[tauri::command]
pub fn delete_from_library(state: State<'_, AppState>, id: String) -> Result<bool, String> {
    Ok(state.store.delete_from_library(&id))
}

#[tauri::command]
pub fn record_analysis(state: State<'_, AppState>, record: AnalysisRecord) -> Result<(), String> {
    state.store.record_analysis(record);
    Ok(())
}

#[tauri::command]
pub fn set_current_record(
    state: State<'_, AppState>,
    record: Option<AnalysisRecord>,
) -> Result<(), String> {
    state.store.set_current(record);
    Ok(())
}

#[tauri::command]
pub async fn clear_workspace(state: State<'_, AppState>) -> Result<(), String> {
    state.store.clear_all().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn link_workspace_file(state: State<'_, AppState>) -> Result<Option<String>, String> {
    state.store.link_file().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn save_workspace_now(state: State<'_, AppState>) -> Result<SaveReport, String> {
    state.store.save_now().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn export_workspace(state: State<'_, AppState>) -> Result<ExportedDocument, String> {
    state.store.export_snapshot().map_err(|e| e.to_string())
}

/// Restores from either raw document text or a file path chosen by the frontend.
#[tauri::command]
pub async fn import_workspace(
    state: State<'_, AppState>,
    contents: Option<String>,
    path: Option<String>,
) -> Result<ImportSummary, String> {
    let result = match (contents, path) {
        (Some(contents), _) => state.store.import_snapshot(&contents),
        (None, Some(path)) => state.store.import_file(&PathBuf::from(path)).await,
        (None, None) => return Err("nothing to import".to_string()),
    };
    result.map_err(|e| e.to_string())
}
