use std::path::PathBuf;

/// Per-user log directory: `~/.local/share/gcex/logs/`
pub fn logs_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("gcex")
        .join("logs")
}

/// Debug log for one project: `~/.local/share/gcex/logs/<project>.log`
pub fn project_log_path(project: &str) -> PathBuf {
    logs_dir().join(format!("{project}.log"))
}

/// Application-default credentials written by `gcloud auth application-default login`.
pub fn adc_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(".config")
            .join("gcloud")
            .join("application_default_credentials.json")
    })
}
