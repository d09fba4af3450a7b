use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analyze::ProviderConfig;
use crate::pipeline::{Timeouts, DEFAULT_CONCURRENCY};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory (~/.local/share/casefile)
    pub data_dir: PathBuf,
    /// Document records, one JSON file per key
    pub store_dir: PathBuf,
    /// Persisted user settings
    pub settings_file: PathBuf,
}

impl Config {
    /// Load configuration or use defaults
    pub fn load_or_default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("casefile");

        Self::with_data_dir(data_dir)
    }

    /// Configuration rooted at an explicit data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            store_dir: data_dir.join("documents"),
            settings_file: data_dir.join("settings.json"),
            data_dir,
        }
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.store_dir)?;
        Ok(())
    }
}

/// User settings persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Worker count for batch runs
    pub concurrency: usize,
    /// Only reprocess incomplete documents by default
    pub failed_only: bool,
    pub extract_timeout_secs: u64,
    pub analyze_timeout_secs: u64,
    pub analyzer: ProviderConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            failed_only: true,
            extract_timeout_secs: 120,
            analyze_timeout_secs: 180,
            analyzer: ProviderConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults if the file is missing or unreadable
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read settings, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Invalid settings file, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            extract: Duration::from_secs(self.extract_timeout_secs),
            analyze: Duration::from_secs(self.analyze_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_derive_from_data_dir() {
        let config = Config::with_data_dir("/tmp/cases");
        assert_eq!(config.store_dir, PathBuf::from("/tmp/cases/documents"));
        assert_eq!(config.settings_file, PathBuf::from("/tmp/cases/settings.json"));
    }

    #[test]
    fn test_settings_missing_or_corrupt_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(Settings::load(&path), Settings::default());

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn test_settings_round_trip_and_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            concurrency: 8,
            failed_only: false,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);

        std::fs::write(&path, r#"{"concurrency": 5}"#).unwrap();
        let loaded = Settings::load(&path);
        assert_eq!(loaded.concurrency, 5);
        assert!(loaded.failed_only);
        assert_eq!(loaded.timeouts().extract, Duration::from_secs(120));
        assert_eq!(loaded.timeouts().analyze, Duration::from_secs(180));
    }
}
