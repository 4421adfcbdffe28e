//! Settings for `browserctl`.
//!
//! Settings come from a TOML file. The file is looked up in this order:
//!
//! 1. An explicit path (`--config`)
//! 2. `$BROWSERCTL_CONFIG`
//! 3. `{config_dir}/browserctl/config.toml` (e.g. `~/.config/browserctl/config.toml`)
//!
//! When none exists the built-in defaults are used. Every key is optional.
//!
//! ```toml
//! [engine]
//! base_image = "selenoid/vnc"
//! tag_prefix = "chrome_"
//! check_timeout_ms = 1000
//! pull_timeout_secs = 60
//! run_timeout_secs = 60
//! stop_timeout_secs = 5
//!
//! [storage]
//! backend = "disk"
//! root = "./profile_storage"
//!
//! [logging]
//! filter = "info"
//! format = "compact"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "BROWSERCTL_CONFIG";

const APP_DIR: &str = "browserctl";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub engine: EngineSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

/// Image naming and per-operation timeouts of the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    pub base_image: String,
    pub tag_prefix: String,
    pub check_timeout_ms: u64,
    pub pull_timeout_secs: u64,
    pub run_timeout_secs: u64,
    pub stop_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_image: "selenoid/vnc".to_string(),
            tag_prefix: "chrome_".to_string(),
            check_timeout_ms: 1000,
            pull_timeout_secs: 60,
            run_timeout_secs: 60,
            stop_timeout_secs: 5,
        }
    }
}

impl EngineSettings {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Disk,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Root directory of the disk backend.
    pub root: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Disk,
            root: PathBuf::from("./profile_storage"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub filter: String,
    /// `pretty`, `compact` or `json`
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Per-user config file location, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

impl Settings {
    /// Resolve and load settings following the lookup order in the module docs.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            return Self::from_file(&path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Loading settings from {:?}", path);
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.base_image.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "engine.base_image",
                message: "must not be empty".to_string(),
            });
        }
        // A ':' before the last '/' is a registry port, not a tag.
        let name = self.engine.base_image.rsplit('/').next().unwrap_or_default();
        if name.contains(':') || name.contains('@') {
            return Err(ConfigError::Invalid {
                key: "engine.base_image",
                message: "must not carry a tag; tags come from the browser version".to_string(),
            });
        }

        let timeouts = [
            ("engine.check_timeout_ms", self.engine.check_timeout_ms),
            ("engine.pull_timeout_secs", self.engine.pull_timeout_secs),
            ("engine.run_timeout_secs", self.engine.run_timeout_secs),
            ("engine.stop_timeout_secs", self.engine.stop_timeout_secs),
        ];
        for (key, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    message: "must be greater than zero".to_string(),
                });
            }
        }

        if self.storage.backend == StorageBackend::Disk
            && self.storage.root.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid {
                key: "storage.root",
                message: "must be set for the disk backend".to_string(),
            });
        }
        Ok(())
    }
}
