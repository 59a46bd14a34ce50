use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ConfigError;

/// A monitored screen rectangle in absolute screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Width and height must both be positive for a region to be usable.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// The three monitored regions. `None` means unconfigured, which is a
/// normal state: that region simply never produces a detection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Regions {
    #[serde(default)]
    pub local: Option<Region>,
    #[serde(default)]
    pub overview: Option<Region>,
    #[serde(default)]
    pub monster: Option<Region>,
}

fn default_threshold() -> f32 {
    0.95
}

/// Match-confidence thresholds. `hostile` gates the local and overview
/// regions, `monster` gates the monster region.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_threshold")]
    pub hostile: f32,
    #[serde(default = "default_threshold")]
    pub monster: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            hostile: default_threshold(),
            monster: default_threshold(),
        }
    }
}

/// Per-alert sound files. An empty path disables sound for that alert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioPaths {
    #[serde(default)]
    pub local: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub monster: String,
    #[serde(default)]
    pub mixed: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Screen regions to monitor
    pub regions: Regions,

    /// Match-confidence thresholds (0.0-1.0)
    pub thresholds: Thresholds,

    /// Webhook URL notified on alerts (empty = disabled)
    pub webhook_url: String,

    /// Alert sound files (empty = silent)
    pub audio_paths: AudioPaths,

    /// Persist captured frames under debug_scans/ for tuning
    pub debug_captures: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            regions: Regions::default(),
            thresholds: Thresholds::default(),
            webhook_url: String::new(),
            audio_paths: AudioPaths::default(),
            debug_captures: false,
        }
    }
}

impl Config {
    /// Load configuration from the config directory next to the executable.
    /// Creates a default config file if none exists. Unknown or missing
    /// fields fall back to their defaults so old config files keep working.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::LoadFailed {
                path: config_path.display().to_string(),
                source: Box::new(e),
            })?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: config_path.display().to_string(),
                    source: Box::new(e),
                })?;
            config.validate()?;
            tracing::info!("Loaded config from: {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            tracing::info!("Created default config at: {}", config_path.display());
            Ok(config)
        }
    }

    /// Save configuration to disk as pretty-printed JSON.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed {
                path: config_path.display().to_string(),
                source: Box::new(e),
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: config_path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(&config_path, json).map_err(|e| ConfigError::SaveFailed {
            path: config_path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    /// Reject configs the detection loop could not act on sensibly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, region) in [
            ("local", &self.regions.local),
            ("overview", &self.regions.overview),
            ("monster", &self.regions.monster),
        ] {
            if let Some(r) = region {
                if !r.is_valid() {
                    return Err(ConfigError::Invalid(format!(
                        "region '{}' has zero width or height: [{}, {}, {}, {}]",
                        name, r.x, r.y, r.width, r.height
                    )));
                }
            }
        }

        for (name, value) in [
            ("hostile", self.thresholds.hostile),
            ("monster", self.thresholds.monster),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "threshold '{}' must be within 0.0-1.0, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Get the config file path (in the app's base directory)
    fn config_path() -> Result<PathBuf, ConfigError> {
        let exe_path = env::current_exe().map_err(|_| ConfigError::NoExeDir)?;
        let exe_dir = exe_path.parent().ok_or(ConfigError::NoExeDir)?;

        Ok(exe_dir.join("config").join("config.json"))
    }

    /// Get the config file path for display purposes
    pub fn config_dir_display() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

/// Shared configuration store.
///
/// The detection loop takes a fresh snapshot at the start of every
/// iteration, so edits made through `update` take effect on the next cycle
/// without a restart. Clones share the same underlying config.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<Config>>,
}

impl ConfigStore {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> Config {
        self.inner.read().clone()
    }

    /// Apply an in-memory edit. Call [`persist`](Self::persist) to write it
    /// to disk.
    pub fn update<F: FnOnce(&mut Config)>(&self, edit: F) {
        let mut config = self.inner.write();
        edit(&mut config);
    }

    /// Write the current configuration to disk.
    pub fn persist(&self) -> Result<(), ConfigError> {
        self.inner.read().save()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
