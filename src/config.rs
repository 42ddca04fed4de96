use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PlaygroundError, Result};
use crate::race::RaceConfig;

pub const DEFAULT_CONFIG_FILE: &str = "playgrounds.toml";

// =============================================================================
// Settings sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://api.example.com/".to_string(),
            timeout_ms: 5_000,
        }
    }
}

impl ClientSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter when `RUST_LOG` is unset, e.g. `"info"` or `"playgrounds=debug"`.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    pub race: RaceConfig,
    pub client: ClientSettings,
    pub log: LogSettings,
}

// =============================================================================
// Loading and validation
// =============================================================================

impl PlaygroundConfig {
    pub fn from_toml_str(source: &str, origin: &str) -> Result<Self> {
        let config: PlaygroundConfig =
            toml::from_str(source).map_err(|e| PlaygroundError::config(origin, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&source, &path.display().to_string())
    }

    /// An explicit path must exist; otherwise `playgrounds.toml` in the
    /// working directory is used when present, else the defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::load(fallback)
                } else {
                    debug!("no config file found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.race.validate()?;

        if self.client.timeout_ms == 0 {
            return Err(PlaygroundError::invalid_config(
                "client.timeout_ms",
                "must be greater than zero",
            ));
        }
        if url::Url::parse(&self.client.base_url).is_err() {
            return Err(PlaygroundError::invalid_config(
                "client.base_url",
                format!("'{}' is not an absolute URL", self.client.base_url),
            ));
        }
        Ok(())
    }
}
