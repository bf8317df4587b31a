use crate::workspace::focus::HistoryPolicy;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current settings schema version - increment when making breaking changes
pub const SETTINGS_VERSION: u32 = 1;

/// Default backend the remote content source and settings store live on.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3000";

/// Default time the binary waits for initial panel loads.
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 15;

/// App settings (persisted locally; the backend may override the panel preference)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Settings schema version for migration support
    #[serde(default = "default_settings_version")]
    pub version: u32,
    /// Base URL of the backend API
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Whether a newly opened panel joins the active stack (true) or opens
    /// a new stack (false)
    #[serde(default = "default_open_panels_in_active_stack")]
    pub open_panels_in_active_stack: bool,
    /// How the active-state tracker bounds its component history
    #[serde(default)]
    pub history_policy: HistoryPolicy,
    /// Timeout for panel loads (seconds)
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            backend_url: default_backend_url(),
            open_panels_in_active_stack: default_open_panels_in_active_stack(),
            history_policy: HistoryPolicy::default(),
            load_timeout_secs: default_load_timeout_secs(),
        }
    }
}

fn default_settings_version() -> u32 {
    // Return 0 for settings files without version field (pre-versioning)
    0
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_open_panels_in_active_stack() -> bool {
    true
}

fn default_load_timeout_secs() -> u64 {
    DEFAULT_LOAD_TIMEOUT_SECS
}

/// Get the settings file path
pub fn get_settings_path() -> PathBuf {
    super::persistence::get_config_dir().join("settings.json")
}

/// Load app settings from the standard location
pub fn load_settings() -> AppSettings {
    load_settings_from(&get_settings_path())
}

/// Load app settings from disk with robust error handling and migration support
pub fn load_settings_from(path: &Path) -> AppSettings {
    if !path.exists() {
        log::info!("Settings file not found at {}, using defaults", path.display());
        return AppSettings::default();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::error!("Failed to read settings file {}: {}", path.display(), e);
            return AppSettings::default();
        }
    };

    // Fast path for valid settings
    match serde_json::from_str::<AppSettings>(&content) {
        Ok(settings) => return migrate_settings(settings, path),
        Err(e) => {
            log::warn!("Failed to parse settings directly: {}, attempting partial recovery", e);
        }
    }

    match recover_settings_from_json(&content) {
        Ok(settings) => {
            log::info!("Recovered settings with partial data");
            let settings = migrate_settings(settings, path);
            if let Err(e) = save_settings_to(path, &settings) {
                log::warn!("Failed to save recovered settings: {}", e);
            }
            settings
        }
        Err(e) => {
            log::error!("Failed to recover settings from {}: {}", path.display(), e);
            log::error!("Using default settings. Your old settings file has been preserved.");
            AppSettings::default()
        }
    }
}

/// Recover settings from a potentially malformed JSON file: keep the valid
/// fields, fall back to defaults for the rest.
fn recover_settings_from_json(content: &str) -> Result<AppSettings> {
    use anyhow::Context;

    let value: serde_json::Value =
        serde_json::from_str(content).context("Settings file is not valid JSON")?;
    let obj = value
        .as_object()
        .context("Settings file root is not a JSON object")?;

    let mut settings = AppSettings::default();

    if let Some(v) = obj.get("version").and_then(|v| v.as_u64()) {
        settings.version = v as u32;
    }

    if let Some(v) = obj.get("backend_url").and_then(|v| v.as_str()) {
        settings.backend_url = v.to_string();
    }

    if let Some(v) = obj
        .get("open_panels_in_active_stack")
        .and_then(geopanes_core::api::parse_bool_preference)
    {
        settings.open_panels_in_active_stack = v;
    }

    if let Some(v) = obj.get("history_policy") {
        match serde_json::from_value::<HistoryPolicy>(v.clone()) {
            Ok(policy) => settings.history_policy = policy,
            Err(_) => log::warn!("Could not parse history_policy, using default"),
        }
    }

    if let Some(v) = obj.get("load_timeout_secs").and_then(|v| v.as_u64()) {
        settings.load_timeout_secs = v.clamp(1, 600);
    }

    Ok(settings)
}

/// Migrate settings from older versions to the current version
fn migrate_settings(mut settings: AppSettings, path: &Path) -> AppSettings {
    let original_version = settings.version;

    if settings.version == 0 {
        log::info!("Migrating settings from pre-versioning (v0) to v1");
        settings.version = 1;
    }

    if settings.version < SETTINGS_VERSION {
        log::warn!(
            "Settings version {} is older than current version {}, some settings may use defaults",
            original_version,
            SETTINGS_VERSION
        );
        settings.version = SETTINGS_VERSION;
    }

    if original_version != settings.version {
        log::info!("Settings migrated from v{} to v{}", original_version, settings.version);
        if let Err(e) = save_settings_to(path, &settings) {
            log::warn!("Failed to save migrated settings: {}", e);
        }
    }

    settings
}

/// Save app settings to the standard location
pub fn save_settings(settings: &AppSettings) -> Result<()> {
    save_settings_to(&get_settings_path(), settings)
}

/// Save app settings to disk. The file is written next to its target and
/// renamed into place, so readers never see a half-written file.
pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("settings.json"));
        assert_eq!(settings, AppSettings::default());
        assert!(settings.open_panels_in_active_stack);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = AppSettings {
            backend_url: "http://example:8080".to_string(),
            open_panels_in_active_stack: false,
            history_policy: HistoryPolicy::PruneOnRemove,
            ..AppSettings::default()
        };
        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path), settings);
    }

    #[test]
    fn save_replaces_existing_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ truncated").unwrap();

        let settings = AppSettings {
            load_timeout_secs: 42,
            ..AppSettings::default()
        };
        save_settings_to(&path, &settings).unwrap();

        assert_eq!(load_settings_from(&path), settings);
        assert!(!path.with_extension("json.tmp").exists());
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn pre_versioning_file_is_migrated_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"open_panels_in_active_stack": false}"#).unwrap();

        let settings = load_settings_from(&path);
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert!(!settings.open_panels_in_active_stack);

        let rewritten: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rewritten["version"], SETTINGS_VERSION);
    }

    #[test]
    fn partially_invalid_file_is_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"version": 1, "backend_url": "http://b:1", "open_panels_in_active_stack": "no",
                "history_policy": {"mode": "bogus"}, "load_timeout_secs": 100000}"#,
        )
        .unwrap();

        let settings = load_settings_from(&path);
        assert_eq!(settings.backend_url, "http://b:1");
        assert!(!settings.open_panels_in_active_stack);
        assert_eq!(settings.history_policy, HistoryPolicy::default());
        assert_eq!(settings.load_timeout_secs, 600);
    }

    #[test]
    fn garbage_file_falls_back_to_defaults_and_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json at all").unwrap();
        assert_eq!(load_settings_from(&path), AppSettings::default());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json at all");
    }
}
