pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod file_link;
pub mod models;
pub mod persistence;
pub mod snapshot;
pub mod storage;
pub mod store;
mod utils;

#[cfg(feature = "desktop")]
mod commands;
#[cfg(feature = "desktop")]
pub mod desktop;

pub use config::WorkspaceConfig;
pub use error::{WorkspaceError, WorkspaceResult};
pub use store::WorkspaceStore;

#[cfg(feature = "desktop")]
pub(crate) struct AppState {
    pub(crate) store: WorkspaceStore,
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Arc;

    use cache::SqliteKeyValueStore;
    use commands::{
        add_to_library, clear_workspace, delete_from_library, export_workspace, get_workspace,
        import_workspace, link_workspace_file, load_workspace, record_analysis,
        save_workspace_now, set_current_record, update_record,
    };
    use desktop::{DialogFilePicker, TauriNotifier};
    use log::warn;
    use tauri::Manager;

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("SmartLex starting up...");

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let cache = SqliteKeyValueStore::open(app_data_dir.join("cache.sqlite3"))?;
                let config = WorkspaceConfig::from_env().with_app_data_dir(app_data_dir);
                let handle = app.handle().clone();

                // The autosave worker is spawned here, so the store has to be
                // built on the async runtime.
                let store = tauri::async_runtime::block_on(async move {
                    let store = WorkspaceStore::new(
                        &config,
                        Arc::new(cache),
                        Arc::new(DialogFilePicker::new(handle.clone())),
                        Arc::new(TauriNotifier::new(handle)),
                    );
                    if let Err(err) = store.load().await {
                        warn!("Starting with an empty workspace: {err}");
                    }
                    store
                });

                app.manage(AppState { store });
                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            get_workspace,
            load_workspace,
            add_to_library,
            update_record,
            delete_from_library,
            record_analysis,
            set_current_record,
            clear_workspace,
            link_workspace_file,
            save_workspace_now,
            export_workspace,
            import_workspace,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let tauri::RunEvent::ExitRequested { .. } = event {
            if let Some(state) = app_handle.try_state::<AppState>() {
                tauri::async_runtime::block_on(state.store.shutdown());
            }
        }
    });
}
