use anyhow::{anyhow, Context, Result};
use balatro_env::{BridgeConfig, EnvSettings};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "actor")]
#[command(about = "Balatro RL Actor")]
#[command(long_about = "Actor that plays Balatro episodes through the in-game RL bridge.

The actor waits for the bridge mod to come up, then repeatedly resets the
environment and plays masked random actions until each episode terminates or
is truncated.")]
pub struct Config {
    /// Bridge host address
    #[arg(long, env = "ACTOR_BRIDGE_HOST", default_value = "127.0.0.1")]
    pub bridge_host: String,

    /// Bridge port
    #[arg(long, env = "ACTOR_BRIDGE_PORT", default_value = "7777")]
    pub bridge_port: u16,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "ACTOR_REQUEST_TIMEOUT_MS", default_value = "5000")]
    pub request_timeout_ms: u64,

    /// Attempts per request when the bridge cannot be reached
    #[arg(long, env = "ACTOR_RETRY_COUNT", default_value = "3")]
    pub retry_count: u32,

    /// Delay between attempts in milliseconds
    #[arg(long, env = "ACTOR_RETRY_DELAY_MS", default_value = "500")]
    pub retry_delay_ms: u64,

    /// How long to wait for the bridge to come up, in seconds
    #[arg(long, env = "ACTOR_CONNECTION_TIMEOUT", default_value = "30")]
    pub connection_timeout_secs: u64,

    /// Maximum episodes to run (-1 for unlimited)
    #[arg(long, env = "ACTOR_MAX_EPISODES", default_value = "-1")]
    pub max_episodes: i32,

    /// Seed for the policy RNG; also forwarded to the bridge on reset
    #[arg(long, env = "ACTOR_SEED")]
    pub seed: Option<u64>,

    /// Environment settings file (TOML)
    #[arg(long, env = "ACTOR_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ACTOR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.bridge_host.is_empty() {
            return Err(anyhow!("bridge_host cannot be empty"));
        }

        if self.bridge_port == 0 {
            return Err(anyhow!("bridge_port must be greater than 0"));
        }

        if self.request_timeout_ms == 0 {
            return Err(anyhow!("request_timeout_ms must be greater than 0"));
        }

        if self.retry_count == 0 {
            return Err(anyhow!("retry_count must be greater than 0"));
        }

        if self.connection_timeout_secs == 0 {
            return Err(anyhow!("connection_timeout_secs must be greater than 0"));
        }

        Ok(())
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            host: self.bridge_host.clone(),
            port: self.bridge_port,
            timeout: Duration::from_millis(self.request_timeout_ms),
            retry_count: self.retry_count,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Settings from the configured file, or defaults when none is given
    pub fn load_settings(&self) -> Result<EnvSettings> {
        match &self.settings {
            Some(path) => EnvSettings::load(path)
                .with_context(|| format!("Failed to load settings from {}", path.display())),
            None => Ok(EnvSettings::default()),
        }
    }

    /// Reset seed for the given episode, derived from the base seed
    pub fn episode_seed(&self, episode: u32) -> Option<String> {
        self.seed
            .map(|seed| seed.wrapping_add(episode as u64).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config::parse_from(["actor"])
    }

    #[test]
    fn test_defaults() {
        let config = base_config();
        assert_eq!(config.bridge_host, "127.0.0.1");
        assert_eq!(config.bridge_port, 7777);
        assert_eq!(config.max_episodes, -1);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());

        let bridge = config.bridge_config();
        assert_eq!(bridge.base_url(), "http://127.0.0.1:7777");
        assert_eq!(bridge.timeout, Duration::from_secs(5));
        assert_eq!(bridge.retry_count, 3);
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::parse_from([
            "actor",
            "--bridge-port",
            "8888",
            "--max-episodes",
            "5",
            "--seed",
            "42",
        ]);
        assert_eq!(config.bridge_port, 8888);
        assert_eq!(config.max_episodes, 5);
        assert_eq!(config.episode_seed(0).as_deref(), Some("42"));
        assert_eq!(config.episode_seed(3).as_deref(), Some("45"));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = base_config();
        config.bridge_host = String::new();
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.bridge_port = 0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.request_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.retry_count = 0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.connection_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_default_without_file() {
        let settings = base_config().load_settings().unwrap();
        assert_eq!(settings, EnvSettings::default());
    }

    #[test]
    fn test_missing_settings_file_is_error() {
        let mut config = base_config();
        config.settings = Some(PathBuf::from("/nonexistent/actor-settings.toml"));
        assert!(config.load_settings().is_err());
    }
}
