//! Game settings and preferences
//!
//! Persisted in LocalStorage. Unknown or missing fields fall back to defaults
//! so older saved blobs keep loading.

use serde::{Deserialize, Serialize};

use crate::tuning::Tuning;

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    /// Music volume (0.0 - 1.0)
    pub music_volume: f32,
    /// Silence everything
    pub muted: bool,

    // === Camera ===
    /// Drag/wheel camera orbit
    pub orbit_controls: bool,

    // === Balance ===
    /// Overrides for game balance; missing fields keep defaults
    pub tuning: Tuning,

    // === Debug ===
    /// Fixed RNG seed for reproducible sessions; random when unset
    pub seed: Option<u64>,
    /// Log level filter name (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            sfx_volume: 1.0,
            music_volume: 1.0,
            muted: false,
            orbit_controls: true,
            tuning: Tuning::default(),
            seed: None,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "note_dash_settings";

    /// Parse settings JSON, clamping volumes into range
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.master_volume = settings.master_volume.clamp(0.0, 1.0);
        settings.sfx_volume = settings.sfx_volume.clamp(0.0, 1.0);
        settings.music_volume = settings.music_volume.clamp(0.0, 1.0);
        settings.tuning = settings.tuning.normalized();
        Ok(settings)
    }

    /// Configured log level, `Info` when the name is not recognised
    pub fn level(&self) -> log::Level {
        self.log_level.parse().unwrap_or(log::Level::Info)
    }

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(err) => log::warn!("Ignoring stored settings: {}", err),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native: settings come from the `NOTE_DASH_SETTINGS` environment variable
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        match std::env::var("NOTE_DASH_SETTINGS") {
            Ok(json) => Self::from_json(&json).unwrap_or_else(|err| {
                log::warn!("Ignoring NOTE_DASH_SETTINGS: {}", err);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}
