//! Settings file for the inbound processor.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default log filter when neither the settings nor `RUST_LOG` set one.
pub const DEFAULT_LOG_FILTER: &str = "mailat_inbound=info,mailat_core=info";

/// Inbound processor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `SQLite` database file.
    pub database_path: PathBuf,
    /// Directory backing the object store; containers are sub-directories.
    pub object_root: PathBuf,
    /// Tracing filter directives, e.g. `mailat_core=debug`.
    pub log_filter: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            database_path: data_dir.join("inbound.db"),
            object_root: data_dir.join("objects"),
            log_filter: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.map_or_else(default_path, Path::to_path_buf);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing settings in {}", path.display()))
    }

    /// Filter directives to install, preferring the settings file.
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// `<config dir>/mailat/inbound.json`.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailat")
        .join("inbound.json")
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailat")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.database_path.ends_with("mailat/inbound.db"));
        assert_eq!(settings.log_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inbound.json");
        std::fs::write(
            &path,
            r#"{"object_root": "/srv/mail", "log_filter": "mailat_core=debug"}"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.object_root, PathBuf::from("/srv/mail"));
        assert_eq!(settings.log_filter(), "mailat_core=debug");
        assert_eq!(settings.database_path, Settings::default().database_path);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inbound.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Settings::load(Some(&path)).is_err());
    }
}
