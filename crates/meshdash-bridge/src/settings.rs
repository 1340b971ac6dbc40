//! Application settings written when the nickname changes.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub nickname: Option<String>,
    #[serde(default)]
    pub joined_channels: Vec<String>,
}

/// Where settings are persisted. Called from the engine context only.
#[allow(async_fn_in_trait)]
pub trait SettingsStore {
    async fn load(&self) -> Result<AppSettings, SettingsError>;

    async fn save(&self, settings: &AppSettings) -> Result<(), SettingsError>;
}

/// Settings stored as a single JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsStore for JsonFileSettings {
    /// A missing file yields default settings.
    async fn load(&self) -> Result<AppSettings, SettingsError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppSettings::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        let json = serde_json::to_vec_pretty(settings)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

/// In-memory store; clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    saved: Arc<Mutex<Option<AppSettings>>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<AppSettings> {
        self.saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl SettingsStore for MemorySettings {
    async fn load(&self) -> Result<AppSettings, SettingsError> {
        Ok(self.latest().unwrap_or_default())
    }

    async fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        *self.saved.lock().unwrap_or_else(|e| e.into_inner()) = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettings::new(dir.path().join("settings.json"));
        assert_eq!(store.load().await.unwrap(), AppSettings::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettings::new(dir.path().join("nested").join("settings.json"));
        let settings = AppSettings {
            nickname: Some("alice".into()),
            joined_channels: vec!["#general".into()],
        };

        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = JsonFileSettings::new(path);
        assert!(matches!(store.load().await, Err(SettingsError::Json(_))));
    }

    #[tokio::test]
    async fn test_memory_settings_shared_between_clones() {
        let store = MemorySettings::new();
        let observer = store.clone();
        store
            .save(&AppSettings {
                nickname: Some("bob".into()),
                joined_channels: Vec::new(),
            })
            .await
            .unwrap();

        assert_eq!(observer.latest().unwrap().nickname.as_deref(), Some("bob"));
    }
}
