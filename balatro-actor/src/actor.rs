use anyhow::{anyhow, Result};
use balatro_core::schema::GamePhase;
use balatro_env::{BalatroEnv, Bridge};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::policy::Policy;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of one played episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub episode_id: Uuid,
    pub steps: u32,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub final_phase: GamePhase,
}

pub struct Actor<B: Bridge> {
    config: Config,
    env: Mutex<BalatroEnv<B>>,
    policy: Mutex<Box<dyn Policy>>,
    episode_count: AtomicU32,
    shutdown_signal: AtomicBool,
}

impl<B: Bridge> Actor<B> {
    pub fn new(config: Config, env: BalatroEnv<B>, policy: Box<dyn Policy>) -> Self {
        Self {
            config,
            env: Mutex::new(env),
            policy: Mutex::new(policy),
            episode_count: AtomicU32::new(0),
            shutdown_signal: AtomicBool::new(false),
        }
    }

    /// Block until the bridge reports healthy or the connection timeout elapses
    pub async fn connect(&self) -> Result<()> {
        let timeout = self.config.connection_timeout();
        info!(
            "Waiting up to {}s for bridge at {}:{}",
            timeout.as_secs(),
            self.config.bridge_host,
            self.config.bridge_port
        );

        let env = self.env.lock().await;
        if !env.bridge().wait_for_connection(timeout, POLL_INTERVAL).await {
            return Err(anyhow!(
                "Could not connect to bridge at {}:{} within {}s; is the game running with the bridge mod loaded?",
                self.config.bridge_host,
                self.config.bridge_port,
                timeout.as_secs()
            ));
        }

        let capabilities = env.capabilities();
        info!(
            "Bridge connected: action_space={}, observation_dim={}, max_horizon={}",
            capabilities.action_space_size, capabilities.observation_dim, capabilities.max_horizon
        );
        Ok(())
    }

    pub async fn run(&self) -> Result<()> {
        info!("Actor starting main loop");

        loop {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                info!("Shutdown signal received, stopping actor");
                break;
            }

            let completed = self.episode_count.load(Ordering::SeqCst);
            if self.config.max_episodes > 0 && completed >= self.config.max_episodes as u32 {
                info!("Reached maximum episodes ({}), stopping", self.config.max_episodes);
                break;
            }

            match self.run_episode().await {
                Ok(summary) => {
                    let count = self.episode_count.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(
                        "Episode {} ({}) finished: steps={}, reward={:.2}, terminated={}, truncated={}, phase={}",
                        count,
                        summary.episode_id,
                        summary.steps,
                        summary.reward,
                        summary.terminated,
                        summary.truncated,
                        summary.final_phase
                    );
                }
                Err(e) => {
                    error!("Episode {} failed: {}", completed + 1, e);
                    // Only keep going if the bridge comes back
                    self.connect().await?;
                }
            }
        }

        info!("Actor stopped gracefully");
        Ok(())
    }

    pub fn shutdown(&self) {
        self.shutdown_signal.store(true, Ordering::SeqCst);
        info!("Shutdown signal set");
    }

    pub fn episode_count(&self) -> u32 {
        self.episode_count.load(Ordering::SeqCst)
    }

    async fn run_episode(&self) -> Result<EpisodeSummary> {
        let episode_id = Uuid::new_v4();
        let seed = self.config.episode_seed(self.episode_count());
        let mut env = self.env.lock().await;

        let (mut observation, mut info) = env.reset(seed.as_deref()).await?;
        debug!("Started episode {} in phase {}", episode_id, info.phase);
        if let Some(reason) = &info.error {
            warn!("Episode {} continues the previous run: {}", episode_id, reason);
        }

        loop {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                debug!("Abandoning episode {} for shutdown", episode_id);
                return Ok(EpisodeSummary {
                    episode_id,
                    steps: env.step_count(),
                    reward: env.episode_reward(),
                    terminated: false,
                    truncated: true,
                    final_phase: info.phase,
                });
            }

            let action = self
                .policy
                .lock()
                .await
                .select_action(&observation, &info.action_mask)?;

            let step = env.step(action).await?;

            if step.terminated || step.truncated {
                return Ok(EpisodeSummary {
                    episode_id,
                    steps: step.info.step_count,
                    reward: step.info.episode_reward,
                    terminated: step.terminated,
                    truncated: step.truncated,
                    final_phase: step.info.phase,
                });
            }

            observation = step.observation;
            info = step.info;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MaskedRandomPolicy;
    use async_trait::async_trait;
    use balatro_core::schema::{ActionResult, GameState, Health, LegalAction, LegalActionSet};
    use balatro_core::StructuredAction;
    use balatro_env::{BridgeError, EnvSettings, ResetOutcome};
    use clap::Parser;
    use std::sync::Mutex as StdMutex;

    /// Bridge whose run ends (back to the menu) after a fixed number of actions
    struct ShortGame {
        actions_per_run: u32,
        played: StdMutex<u32>,
        resets: StdMutex<u32>,
        healthy: bool,
    }

    impl ShortGame {
        fn new(actions_per_run: u32) -> Self {
            Self {
                actions_per_run,
                played: StdMutex::new(0),
                resets: StdMutex::new(0),
                healthy: true,
            }
        }

        fn snapshot(&self, phase: GamePhase) -> (GameState, LegalActionSet) {
            let state = GameState {
                phase,
                money: 4,
                ante: 1,
                ..GameState::default()
            };
            let legal = LegalActionSet {
                phase,
                actions: vec![LegalAction::ShopEnd, LegalAction::ShopReroll],
                ..LegalActionSet::default()
            };
            (state, legal)
        }
    }

    #[async_trait]
    impl Bridge for ShortGame {
        async fn health(&self) -> Result<Health, BridgeError> {
            if self.healthy {
                Ok(Health {
                    status: "ok".to_string(),
                    ..Health::default()
                })
            } else {
                Err(BridgeError::Transport {
                    url: "test://bridge".to_string(),
                    attempts: 1,
                    message: "down".to_string(),
                })
            }
        }

        async fn state(&self) -> Result<GameState, BridgeError> {
            Ok(self.snapshot(GamePhase::Shop).0)
        }

        async fn legal_actions(&self) -> Result<LegalActionSet, BridgeError> {
            Ok(self.snapshot(GamePhase::Shop).1)
        }

        async fn execute(&self, _action: &StructuredAction) -> Result<ActionResult, BridgeError> {
            let mut played = self.played.lock().unwrap();
            *played += 1;
            let phase = if *played % self.actions_per_run == 0 {
                GamePhase::Menu
            } else {
                GamePhase::Shop
            };
            let (state, legal) = self.snapshot(phase);
            Ok(ActionResult {
                ok: true,
                error: None,
                state: Some(state),
                legal: Some(legal),
            })
        }

        async fn reset(&self, _seed: Option<&str>) -> Result<ResetOutcome, BridgeError> {
            *self.resets.lock().unwrap() += 1;
            let (state, legal) = self.snapshot(GamePhase::Shop);
            Ok(ResetOutcome::Reset { state, legal })
        }
    }

    fn test_config(max_episodes: i32) -> Config {
        let mut config = Config::parse_from(["actor", "--seed", "3"]);
        config.max_episodes = max_episodes;
        config.connection_timeout_secs = 1;
        config
    }

    fn actor(game: ShortGame, max_episodes: i32, max_steps: u32) -> Actor<ShortGame> {
        let settings = EnvSettings {
            max_steps,
            ..EnvSettings::default()
        };
        Actor::new(
            test_config(max_episodes),
            BalatroEnv::new(game, settings),
            Box::new(MaskedRandomPolicy::with_seed(3)),
        )
    }

    #[tokio::test]
    async fn test_runs_until_max_episodes() {
        let actor = actor(ShortGame::new(4), 3, 100);
        actor.connect().await.unwrap();
        actor.run().await.unwrap();

        assert_eq!(actor.episode_count(), 3);
        let env = actor.env.lock().await;
        assert_eq!(*env.bridge().resets.lock().unwrap(), 3);
        assert_eq!(*env.bridge().played.lock().unwrap(), 12);
    }

    #[tokio::test]
    async fn test_episode_summary_reports_game_over() {
        let actor = actor(ShortGame::new(2), 1, 100);
        let summary = actor.run_episode().await.unwrap();

        assert_eq!(summary.steps, 2);
        assert!(summary.terminated);
        assert!(!summary.truncated);
        assert_eq!(summary.final_phase, GamePhase::Menu);
        assert_eq!(summary.reward, -100.0);
    }

    #[tokio::test]
    async fn test_episode_truncates_at_max_steps() {
        let actor = actor(ShortGame::new(1000), 1, 5);
        let summary = actor.run_episode().await.unwrap();

        assert_eq!(summary.steps, 5);
        assert!(summary.truncated);
        assert!(!summary.terminated);
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_next_episode() {
        let actor = actor(ShortGame::new(2), -1, 100);
        actor.shutdown();
        actor.run().await.unwrap();
        assert_eq!(actor.episode_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_fails_when_bridge_is_down() {
        let mut game = ShortGame::new(2);
        game.healthy = false;
        let actor = actor(game, 1, 100);
        assert!(actor.connect().await.is_err());
    }
}
