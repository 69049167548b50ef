use crate::domain::models::WriteMode;
use crate::infrastructure::bluetooth::protocol;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_false")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_false(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
        .to_string_lossy()
        .into_owned()
}
fn default_prefix() -> String {
    "infinitime-timesync".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

const APP_DIR_NAME: &str = "infinitime-timesync";
const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Target device
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_characteristic_uuid")]
    pub characteristic_uuid: String,

    // Adapter & scan
    #[serde(default)]
    pub adapter_index: usize,
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    #[serde(default)]
    pub write_mode: WriteMode,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            characteristic_uuid: default_characteristic_uuid(),
            adapter_index: 0,
            scan_timeout_secs: default_scan_timeout_secs(),
            write_mode: WriteMode::default(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_device_name() -> String {
    protocol::DEFAULT_DEVICE_NAME.to_string()
}
fn default_characteristic_uuid() -> String {
    protocol::CURRENT_TIME_CHAR_UUID.to_string()
}
fn default_scan_timeout_secs() -> u64 {
    protocol::DEFAULT_SCAN_TIMEOUT_SECS
}

/// Values given on the command line; `None` keeps the file/default value
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub device_name: Option<String>,
    pub characteristic_uuid: Option<String>,
    pub adapter_index: Option<usize>,
    pub scan_timeout_secs: Option<u64>,
    pub write_mode: Option<WriteMode>,
    pub log_level: Option<String>,
}

impl Settings {
    pub fn apply(&mut self, overrides: SettingsOverrides) {
        if let Some(name) = overrides.device_name {
            self.device_name = name;
        }
        if let Some(uuid) = overrides.characteristic_uuid {
            self.characteristic_uuid = uuid;
        }
        if let Some(index) = overrides.adapter_index {
            self.adapter_index = index;
        }
        if let Some(secs) = overrides.scan_timeout_secs {
            self.scan_timeout_secs = secs;
        }
        if let Some(mode) = overrides.write_mode {
            self.write_mode = mode;
        }
        if let Some(level) = overrides.log_level {
            self.log_settings.level = level;
        }
    }
}

/// Read-only settings loader. Nothing is ever written back.
pub struct SettingsService;

impl SettingsService {
    /// Load settings from `explicit_path`, or from the default location if a
    /// file exists there, or fall back to defaults.
    pub fn load(explicit_path: Option<&Path>) -> anyhow::Result<Settings> {
        match explicit_path {
            Some(path) => Self::load_from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::load_from_file(&path),
                _ => Ok(Settings::default()),
            },
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.device_name, "InfiniTime");
        assert_eq!(
            settings.characteristic_uuid,
            "00002a2b-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(settings.scan_timeout_secs, 30);
        assert_eq!(settings.write_mode, WriteMode::WithoutResponse);
        assert!(!settings.log_settings.file_logging_enabled);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "device_name": "Pinetime-JF", "log_settings": {{ "level": "debug" }} }}"#
        )
        .unwrap();

        let settings = SettingsService::load(Some(file.path())).unwrap();
        assert_eq!(settings.device_name, "Pinetime-JF");
        assert_eq!(settings.scan_timeout_secs, 30);
        assert_eq!(settings.log_settings.level, "debug");
        assert_eq!(settings.log_settings.rotation, "daily");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SettingsService::load(Some(dir.path().join("nope.json").as_path())).unwrap_err();
        assert!(err.to_string().contains("Failed to read settings file"));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = SettingsService::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings file"));
    }

    #[test]
    fn test_overrides() {
        let mut settings = Settings::default();
        settings.apply(SettingsOverrides {
            device_name: Some("Watch".to_string()),
            scan_timeout_secs: Some(5),
            write_mode: Some(WriteMode::WithResponse),
            log_level: Some("trace".to_string()),
            ..Default::default()
        });
        assert_eq!(settings.device_name, "Watch");
        assert_eq!(settings.scan_timeout_secs, 5);
        assert_eq!(settings.write_mode, WriteMode::WithResponse);
        assert_eq!(settings.log_settings.level, "trace");
        assert_eq!(settings.adapter_index, 0);
    }
}
