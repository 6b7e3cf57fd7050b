//! Balatro environment runtime
//!
//! This crate connects the pure codec and featurizer from `balatro-core` to a
//! running game:
//! - `bridge`: async `Bridge` trait and its error taxonomy
//! - `http`: HTTP/JSON bridge client with retries
//! - `reward`: shaped reward between snapshots
//! - `episode`: reset/step state machine
//! - `settings`: TOML-backed environment settings

pub mod bridge;
pub mod episode;
pub mod http;
pub mod reward;
pub mod settings;

// Re-export main types
pub use bridge::{Bridge, BridgeError, ResetOutcome};
pub use episode::{BalatroEnv, EnvError, EpisodeStatus, Step, StepInfo};
pub use http::{BridgeConfig, HttpBridge};
pub use reward::{shaped_reward, RewardWeights};
pub use settings::{EnvSettings, SettingsError};
