//! Bridge abstraction: the game process seen through its request/response API
//!
//! Connectivity problems surface as [`BridgeError`]; logical failures (an
//! action the game rejected, a reset it cannot perform) travel inside `Ok`
//! values so callers can resynchronize instead of giving up.

use std::time::Duration;

use async_trait::async_trait;
use balatro_core::schema::{ActionResult, GameState, Health, LegalActionSet};
use balatro_core::StructuredAction;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Error type for bridge requests
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to reach bridge at {url} after {attempts} attempts: {message}")]
    Transport {
        url: String,
        attempts: u32,
        message: String,
    },
    #[error("Bridge returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Failed to decode bridge response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Result of asking the bridge for a fresh run
#[derive(Debug, Clone, PartialEq)]
pub enum ResetOutcome {
    Reset {
        state: GameState,
        legal: LegalActionSet,
    },
    /// The bridge answered the reset with an error payload
    Unsupported(String),
}

/// Request/response access to a running game
///
/// At most one request is in flight per bridge; implementations own their
/// own retry policy.
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn health(&self) -> Result<Health, BridgeError>;

    async fn state(&self) -> Result<GameState, BridgeError>;

    async fn legal_actions(&self) -> Result<LegalActionSet, BridgeError>;

    /// Submit one action
    async fn execute(&self, action: &StructuredAction) -> Result<ActionResult, BridgeError>;

    /// Ask for a new run; `seed` is advisory
    async fn reset(&self, seed: Option<&str>) -> Result<ResetOutcome, BridgeError>;

    /// True when the bridge reports itself healthy
    async fn is_connected(&self) -> bool {
        match self.health().await {
            Ok(health) => health.status == "ok",
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }

    /// Poll [`Bridge::is_connected`] until it succeeds or `timeout` elapses
    async fn wait_for_connection(&self, timeout: Duration, poll_interval: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_connected().await {
                return true;
            }
            if Instant::now() + poll_interval > deadline {
                return false;
            }
            sleep(poll_interval).await;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::ScriptedBridge;
    use super::*;

    #[tokio::test]
    async fn test_is_connected_follows_health() {
        let bridge = ScriptedBridge::new();
        assert!(bridge.is_connected().await);

        let down = ScriptedBridge::default();
        assert!(!down.is_connected().await);
    }

    #[tokio::test]
    async fn test_wait_for_connection_gives_up() {
        let down = ScriptedBridge::default();
        let started = Instant::now();
        let connected = down
            .wait_for_connection(Duration::from_millis(50), Duration::from_millis(10))
            .await;
        assert!(!connected);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_exhausted_script_is_unreachable() {
        let bridge = ScriptedBridge::new();
        assert!(matches!(bridge.state().await, Err(BridgeError::Transport { .. })));
    }
}
