use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_AUTOSAVE_DEBOUNCE: Duration = Duration::from_secs(2);
const DEBUG_AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(250);
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const CACHE_KEY: &str = "smartlex_workspace";
pub const APP_DATA_FILE_NAME: &str = "workspace.lex";

#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Quiet period after the last mutation before an autosave fires.
    pub autosave_debounce: Duration,
    pub history_limit: usize,
    pub cache_key: String,
    /// Set only inside the desktop shell.
    pub app_data_dir: Option<PathBuf>,
    pub app_data_file_name: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            autosave_debounce: DEFAULT_AUTOSAVE_DEBOUNCE,
            history_limit: DEFAULT_HISTORY_LIMIT,
            cache_key: CACHE_KEY.into(),
            app_data_dir: None,
            app_data_file_name: APP_DATA_FILE_NAME.into(),
        }
    }
}

impl WorkspaceConfig {
    /// Defaults overridden by `SMARTLEX_AUTOSAVE_MS`, `SMARTLEX_HISTORY_LIMIT`
    /// and `SMARTLEX_DEBUG`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let debug_mode = lookup("SMARTLEX_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            config.autosave_debounce = DEBUG_AUTOSAVE_DEBOUNCE;
        }

        if let Some(ms) = lookup("SMARTLEX_AUTOSAVE_MS").and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.autosave_debounce = Duration::from_millis(ms);
        }

        if let Some(limit) = lookup("SMARTLEX_HISTORY_LIMIT")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|limit| *limit > 0)
        {
            config.history_limit = limit;
        }

        config
    }

    pub fn with_app_data_dir(mut self, dir: PathBuf) -> Self {
        self.app_data_dir = Some(dir);
        self
    }
}
