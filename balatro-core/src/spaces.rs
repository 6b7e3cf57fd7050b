//! Space descriptors advertised to the training loop
//!
//! The action and observation spaces are fixed; they are reported identically
//! in every phase, with unused regions always false / zero.

use serde::Serialize;

use crate::action::ACTION_SPACE_SIZE;
use crate::featurizer::OBSERVATION_DIM;

pub const ENV_ID: &str = "balatro";
pub const ACTION_ENCODING: &str = "balatro_action_index:v1";
pub const OBS_ENCODING: &str = "f32x136:v1";
pub const SCHEMA_VERSION: u32 = 1;

/// Environment identification information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineId {
    pub env_id: String,
    pub build_id: String,
}

/// Encoding format descriptors
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Encoding {
    pub action: String,
    pub obs: String,
    pub schema_version: u32,
}

/// Environment capabilities
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub id: EngineId,
    pub encoding: Encoding,
    /// Step budget per episode
    pub max_horizon: u32,
    pub action_space_size: usize,
    pub observation_dim: usize,
}

impl Capabilities {
    pub fn new(max_horizon: u32) -> Self {
        Self {
            id: EngineId {
                env_id: ENV_ID.to_string(),
                build_id: env!("CARGO_PKG_VERSION").to_string(),
            },
            encoding: Encoding {
                action: ACTION_ENCODING.to_string(),
                obs: OBS_ENCODING.to_string(),
                schema_version: SCHEMA_VERSION,
            },
            max_horizon,
            action_space_size: ACTION_SPACE_SIZE,
            observation_dim: OBSERVATION_DIM,
        }
    }
}
