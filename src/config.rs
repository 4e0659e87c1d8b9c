use crate::storage::WriteOptions;
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "tutoria";
const SETTINGS_FILE: &str = "settings.json";
const FALLBACK_EDITOR: &str = "vi";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Used by `edit` when neither `--editor` nor `$EDITOR` is given.
    pub editor: Option<String>,
    pub indent: usize,
    pub backup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let write = WriteOptions::default();
        Settings {
            editor: None,
            indent: write.indent,
            backup: write.backup,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: Settings,
    pub base_dir: PathBuf,
}

impl AppConfig {
    /// Resolves `<data_home>/tutoria`, creates it, and reads (or seeds)
    /// `settings.json` there.
    pub fn load(data_home: Option<&Path>) -> Result<Self> {
        let base_dir = resolve_data_home(data_home)?.join(APP_DIR);
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create {}", base_dir.display()))?;

        let settings: Settings =
            load_or_write(&base_dir.join(SETTINGS_FILE), Settings::default())?;
        tracing::debug!(dir = %base_dir.display(), ?settings, "config loaded");

        Ok(AppConfig { settings, base_dir })
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            indent: self.settings.indent,
            backup: self.settings.backup,
        }
    }

    /// Command-line or environment editor first, then settings, then `vi`.
    pub fn editor(&self, requested: Option<&str>) -> String {
        requested
            .filter(|e| !e.trim().is_empty())
            .map(str::to_string)
            .or_else(|| self.settings.editor.clone())
            .unwrap_or_else(|| FALLBACK_EDITOR.to_string())
    }
}

/// An explicit, non-empty override wins; otherwise the platform data dir.
pub fn resolve_data_home(data_home: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = data_home.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir.to_path_buf());
    }
    let dirs = BaseDirs::new().context("Unable to determine platform data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

fn load_or_write<T>(path: &Path, default: T) -> Result<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        let data = serde_json::to_string_pretty(&default)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        return Ok(default);
    }
    let bytes =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&bytes)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn explicit_data_home_wins() {
        let dir = tempdir().unwrap();
        let cfg = AppConfig::load(Some(dir.path())).unwrap();
        assert_eq!(cfg.base_dir, dir.path().join("tutoria"));
        assert!(cfg.base_dir.is_dir());
    }

    #[test]
    fn seeds_default_settings() {
        let dir = tempdir().unwrap();
        let cfg = AppConfig::load(Some(dir.path())).unwrap();
        assert_eq!(cfg.settings, Settings::default());
        let written = fs::read_to_string(cfg.base_dir.join(SETTINGS_FILE)).unwrap();
        let parsed: Settings = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn partial_settings_keep_defaults() {
        let dir = tempdir().unwrap();
        let base = dir.path().join(APP_DIR);
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join(SETTINGS_FILE), r#"{"indent": 2}"#).unwrap();

        let cfg = AppConfig::load(Some(dir.path())).unwrap();
        assert_eq!(cfg.settings.indent, 2);
        assert!(cfg.settings.backup);
        assert_eq!(cfg.write_options().indent, 2);
    }

    #[test]
    fn malformed_settings_are_reported() {
        let dir = tempdir().unwrap();
        let base = dir.path().join(APP_DIR);
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join(SETTINGS_FILE), "{").unwrap();
        let err = AppConfig::load(Some(dir.path())).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse"));
    }

    #[test]
    fn editor_precedence() {
        let mut cfg = AppConfig {
            settings: Settings::default(),
            base_dir: PathBuf::from("/tmp/tutoria"),
        };
        assert_eq!(cfg.editor(None), "vi");
        cfg.settings.editor = Some("nano".into());
        assert_eq!(cfg.editor(None), "nano");
        assert_eq!(cfg.editor(Some("  ")), "nano");
        assert_eq!(cfg.editor(Some("hx")), "hx");
    }
}
