//! TOML configuration of the location programs and the event store.

use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};
use spk_event::StoreSettings;
use spk_locate::{Hyp2000Settings, ThreeDLocSettings};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Velocity model name recorded with 3dloc origins
    pub velocity_model: String,
    pub three_dloc: ThreeDLocSettings,
    pub hyp2000: Hyp2000Settings,
    pub store: StoreSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            velocity_model: "STAUFEN".to_string(),
            three_dloc: ThreeDLocSettings::default(),
            hyp2000: Hyp2000Settings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> anyhow::Result<Config> {
        Ok(toml::from_str(text)?)
    }

    /// Load `path`, falling back to the defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Config::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }
}
