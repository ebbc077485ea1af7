use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::geometry::{CaptureZone, ClientRect};
use crate::intake::EventScope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannerSettings {
    /// Capture rectangle in CSS pixels. Unset means the layout has not been
    /// measured and every detection is accepted.
    pub capture_rect: Option<ClientRect>,
    pub device_pixel_ratio: f64,
    /// Detections buffered between the sensor and the listener.
    pub detection_buffer: usize,
    pub event_id: Option<String>,
    pub acting_user: Option<String>,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            capture_rect: None,
            device_pixel_ratio: 1.0,
            detection_buffer: 16,
            event_id: None,
            acting_user: None,
        }
    }
}

impl ScannerSettings {
    pub fn capture_zone(&self) -> Option<CaptureZone> {
        self.capture_rect
            .map(|rect| CaptureZone::from_client_rect(rect, self.device_pixel_ratio))
    }

    pub fn event_scope(&self) -> Option<EventScope> {
        self.event_id.clone().map(|event_id| EventScope {
            event_id,
            acting_user: self.acting_user.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    scanner: ScannerSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Loads settings from `path`, writing defaults if the file is missing.
    pub fn new(path: PathBuf) -> Result<Self> {
        let exists = path.exists();
        let data = if exists {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings in {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        let store = Self {
            path,
            data: RwLock::new(data),
        };
        if !exists {
            store.persist(&store.read())?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scanner(&self) -> ScannerSettings {
        self.read().scanner.clone()
    }

    pub fn update_scanner(&self, settings: ScannerSettings) -> Result<()> {
        let mut guard = self.write();
        guard.scanner = settings;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
