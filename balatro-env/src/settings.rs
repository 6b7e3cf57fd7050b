//! Environment settings loaded from TOML
//!
//! Every field is optional; an empty file yields the defaults:
//!
//! ```toml
//! max_steps = 10000
//!
//! [reward]
//! money = 1.0
//! chips = 0.00001
//!
//! [codec]
//! default_sort_mode = "rank"
//! default_shop_slot = 1
//! ```

use std::path::Path;

use balatro_core::CodecConfig;
use serde::{Deserialize, Serialize};

use crate::reward::RewardWeights;

pub const DEFAULT_MAX_STEPS: u32 = 10_000;

/// Error type for settings loading
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvSettings {
    /// Steps after which an episode is truncated
    pub max_steps: u32,
    pub reward: RewardWeights,
    pub codec: CodecConfig,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            reward: RewardWeights::default(),
            codec: CodecConfig::default(),
        }
    }
}

impl EnvSettings {
    pub fn from_toml_str(raw: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_steps == 0 {
            return Err(SettingsError::Invalid(
                "max_steps must be greater than 0".to_string(),
            ));
        }
        let weights = [
            self.reward.money,
            self.reward.chips,
            self.reward.blind_bonus,
            self.reward.ante_bonus,
            self.reward.game_over,
            self.reward.unreachable,
        ];
        if weights.iter().any(|weight| !weight.is_finite()) {
            return Err(SettingsError::Invalid(
                "reward weights must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
