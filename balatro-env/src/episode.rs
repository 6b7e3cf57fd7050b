//! Episode controller
//!
//! Drives one episode against a [`Bridge`]:
//! - `reset` starts a fresh episode, degrading to the bridge's current
//!   snapshot when it cannot start a new run
//! - `step` decodes an action index, executes it, and produces the
//!   observation, shaped reward and termination flags
//!
//! A lost bridge never escapes `step` as an error; it becomes a terminal step
//! carrying the unreachable penalty.

use balatro_core::action::{ActionCodec, CodecError, ACTION_SPACE_SIZE};
use balatro_core::featurizer::{StateFeaturizer, OBSERVATION_DIM};
use balatro_core::schema::{ActionResult, GamePhase, GameState, LegalActionSet};
use balatro_core::spaces::Capabilities;
use balatro_core::StructuredAction;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::bridge::{Bridge, BridgeError, ResetOutcome};
use crate::reward::{shaped_reward, RewardWeights};
use crate::settings::EnvSettings;

/// Hand size assumed for the mask before any snapshot is known
const DEFAULT_HAND_SIZE: usize = 8;

/// Error type for environment operations
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("Episode not started, call reset first")]
    EpisodeNotStarted,
    #[error("Episode finished, call reset to start a new one")]
    EpisodeFinished,
    #[error("Invalid action: {0}")]
    Codec(#[from] CodecError),
    #[error("Bridge unavailable: {0}")]
    Bridge(#[from] BridgeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStatus {
    Uninitialized,
    Running,
    /// Absorbing until the next reset
    Done,
}

/// Per-step diagnostics returned alongside every observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    pub step_count: u32,
    pub episode_reward: f64,
    pub connected: bool,
    pub status: EpisodeStatus,
    pub phase: GamePhase,
    pub money: i64,
    pub ante: i64,
    pub round: i64,
    pub hands_remaining: i64,
    pub discards_remaining: i64,
    pub hand_size: usize,
    pub joker_count: usize,
    pub chips_needed: Option<i64>,
    pub chips_scored: Option<i64>,
    pub action_mask: Vec<bool>,
    /// Bridge failure, or the reason an action was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one [`BalatroEnv::step`]
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub observation: Vec<f32>,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// Environment over a single bridge connection
///
/// `step` calls must be sequential; run one instance per bridge for parallel
/// episodes.
pub struct BalatroEnv<B: Bridge> {
    bridge: B,
    codec: ActionCodec,
    featurizer: StateFeaturizer,
    weights: RewardWeights,
    max_steps: u32,

    status: EpisodeStatus,
    step_count: u32,
    episode_reward: f64,
    connected: bool,
    state: Option<GameState>,
    legal: Option<LegalActionSet>,
}

impl<B: Bridge> BalatroEnv<B> {
    pub fn new(bridge: B, settings: EnvSettings) -> Self {
        Self {
            bridge,
            codec: ActionCodec::new(settings.codec),
            featurizer: StateFeaturizer::new(),
            weights: settings.reward,
            max_steps: settings.max_steps,
            status: EpisodeStatus::Uninitialized,
            step_count: 0,
            episode_reward: 0.0,
            connected: false,
            state: None,
            legal: None,
        }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn codec(&self) -> &ActionCodec {
        &self.codec
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::new(self.max_steps)
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn episode_reward(&self) -> f64 {
        self.episode_reward
    }

    pub fn current_state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    pub fn legal_actions(&self) -> Option<&LegalActionSet> {
        self.legal.as_ref()
    }

    /// Start a new episode
    ///
    /// When the bridge cannot start a new run, the episode begins from its
    /// current snapshot instead and `info.error` says why. Fails only when
    /// that snapshot is also unavailable, leaving the environment
    /// uninitialized.
    pub async fn reset(&mut self, seed: Option<&str>) -> Result<(Vec<f32>, StepInfo), EnvError> {
        self.status = EpisodeStatus::Uninitialized;
        self.step_count = 0;
        self.episode_reward = 0.0;
        self.state = None;
        self.legal = None;

        let (state, legal, degraded) = match self.bridge.reset(seed).await {
            Ok(ResetOutcome::Reset { state, legal }) => (state, legal, None),
            Ok(ResetOutcome::Unsupported(reason)) => {
                warn!("Bridge cannot reset ({}), continuing from current state", reason);
                let (state, legal) = self.fetch_snapshot().await?;
                (state, legal, Some(format!("reset unsupported: {}", reason)))
            }
            Err(e) => {
                warn!("Reset request failed ({}), continuing from current state", e);
                let (state, legal) = self.fetch_snapshot().await?;
                (state, legal, Some(format!("reset failed: {}", e)))
            }
        };

        info!(
            "Episode started: phase={}, ante={}, money={}",
            state.phase, state.ante, state.money
        );

        self.state = Some(state);
        self.legal = Some(legal);
        self.connected = true;
        self.status = EpisodeStatus::Running;

        let mut info = self.info();
        info.error = degraded;
        Ok((self.observation(), info))
    }

    /// Execute one action index
    ///
    /// # Returns
    ///
    /// The step result; a lost bridge yields a terminal step, never an error.
    /// Errors are reserved for misuse: stepping outside a running episode or
    /// passing an index the codec rejects. Neither changes the episode.
    pub async fn step(&mut self, action_index: usize) -> Result<Step, EnvError> {
        match self.status {
            EpisodeStatus::Uninitialized => return Err(EnvError::EpisodeNotStarted),
            EpisodeStatus::Done => return Err(EnvError::EpisodeFinished),
            EpisodeStatus::Running => {}
        }

        let action = self.codec.decode(action_index)?;
        self.step_count += 1;

        let (state, legal, rejection) = match self.submit(&action).await {
            Ok(outcome) => outcome,
            Err(e) => return Ok(self.lose_bridge(&action, e)),
        };

        let reward = shaped_reward(self.state.as_ref(), &state, &self.weights);
        self.episode_reward += reward;

        let terminated = state.phase.is_out_of_run()
            || state.error.as_deref().is_some_and(|error| !error.is_empty());
        let truncated = self.step_count >= self.max_steps;

        debug!(
            "Step {}: {} -> phase={}, reward={:.4}",
            self.step_count, action, state.phase, reward
        );

        self.state = Some(state);
        self.legal = Some(legal);

        if terminated || truncated {
            self.status = EpisodeStatus::Done;
            info!(
                "Episode finished after {} steps: reward={:.2}, terminated={}, truncated={}",
                self.step_count, self.episode_reward, terminated, truncated
            );
        }

        let mut info = self.info();
        info.error = rejection;

        Ok(Step {
            observation: self.observation(),
            reward,
            terminated,
            truncated,
            info,
        })
    }

    /// Legality mask for the current snapshot; all false before the first reset
    pub fn action_mask(&self) -> Vec<bool> {
        match &self.legal {
            Some(legal) => self.codec.mask(legal, self.hand_size()),
            None => vec![false; ACTION_SPACE_SIZE],
        }
    }

    /// Uniform over legal indices, or over the whole space when none are legal
    pub fn sample_legal_action<R: Rng>(&self, rng: &mut R) -> usize {
        let legal = match &self.legal {
            Some(legal) => self.codec.legal_indices(legal, self.hand_size()),
            None => Vec::new(),
        };
        match legal.choose(rng) {
            Some(&index) => index,
            None => rng.gen_range(0..ACTION_SPACE_SIZE),
        }
    }

    pub fn observation(&self) -> Vec<f32> {
        match &self.state {
            Some(state) => self.featurizer.tokenize(state),
            None => vec![0.0; OBSERVATION_DIM],
        }
    }

    /// Execute and return the snapshot that follows, plus the rejection
    /// reason if the bridge refused the action
    async fn submit(
        &self,
        action: &StructuredAction,
    ) -> Result<(GameState, LegalActionSet, Option<String>), BridgeError> {
        match self.bridge.execute(action).await? {
            ActionResult {
                ok: true,
                state: Some(state),
                legal,
                ..
            } => {
                let legal = match legal {
                    Some(legal) => legal,
                    None => self.bridge.legal_actions().await?,
                };
                Ok((state, legal, None))
            }
            rejected => {
                let reason = rejected
                    .error
                    .unwrap_or_else(|| "action returned no state".to_string());
                debug!("Action {} not applied: {}", action, reason);
                let (state, legal) = self.fetch_snapshot().await?;
                Ok((state, legal, Some(reason)))
            }
        }
    }

    async fn fetch_snapshot(&self) -> Result<(GameState, LegalActionSet), BridgeError> {
        let state = self.bridge.state().await?;
        let legal = self.bridge.legal_actions().await?;
        Ok((state, legal))
    }

    fn lose_bridge(&mut self, action: &StructuredAction, e: BridgeError) -> Step {
        error!("Bridge lost while executing {}: {}", action, e);
        self.connected = false;
        self.status = EpisodeStatus::Done;

        let mut info = self.info();
        info.error = Some(e.to_string());

        Step {
            observation: self.observation(),
            reward: self.weights.unreachable,
            terminated: true,
            truncated: false,
            info,
        }
    }

    fn hand_size(&self) -> usize {
        self.state
            .as_ref()
            .map_or(DEFAULT_HAND_SIZE, |state| state.hand.len())
    }

    fn info(&self) -> StepInfo {
        let state = self.state.as_ref();
        StepInfo {
            step_count: self.step_count,
            episode_reward: self.episode_reward,
            connected: self.connected,
            status: self.status,
            phase: state.map(|s| s.phase).unwrap_or_default(),
            money: state.map_or(0, |s| s.money),
            ante: state.map_or(0, |s| s.ante),
            round: state.map_or(0, |s| s.round),
            hands_remaining: state.map_or(0, |s| s.hands_remaining),
            discards_remaining: state.map_or(0, |s| s.discards_remaining),
            hand_size: state.map_or(0, |s| s.hand.len()),
            joker_count: state.map_or(0, |s| s.jokers.len()),
            chips_needed: state.and_then(|s| s.chips_needed()),
            chips_scored: state.and_then(|s| s.blind.as_ref().map(|blind| blind.chips_scored)),
            action_mask: self.action_mask(),
            error: None,
        }
    }
}
