//! Shaped reward between consecutive snapshots

use balatro_core::schema::{GamePhase, GameState};
use serde::{Deserialize, Serialize};

/// Reward coefficients
///
/// Penalties are stored as the (negative) value added to the reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    /// Per unit of money gained or lost
    pub money: f64,
    /// Per chip scored toward the blind; only increases count
    pub chips: f64,
    /// Blind name changed between two named blinds
    pub blind_bonus: f64,
    /// Ante increased
    pub ante_bonus: f64,
    /// Run dropped back to the main menu
    pub game_over: f64,
    /// Bridge stopped answering
    pub unreachable: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            money: 1.0,
            chips: 1e-5,
            blind_bonus: 10.0,
            ante_bonus: 100.0,
            game_over: -100.0,
            unreachable: -100.0,
        }
    }
}

/// Reward for the transition `prev -> new`; zero when there is no `prev`
pub fn shaped_reward(prev: Option<&GameState>, new: &GameState, weights: &RewardWeights) -> f64 {
    let Some(prev) = prev else {
        return 0.0;
    };

    let mut reward = weights.money * (new.money - prev.money) as f64;

    let chip_gain = new.chips_scored() - prev.chips_scored();
    if chip_gain > 0 {
        reward += weights.chips * chip_gain as f64;
    }

    // Empty names count as absent
    let named = |state: &GameState| state.blind_name().filter(|name| !name.is_empty()).map(str::to_string);
    if let (Some(before), Some(after)) = (named(prev), named(new)) {
        if before != after {
            reward += weights.blind_bonus;
        }
    }

    if new.ante > prev.ante {
        reward += weights.ante_bonus;
    }

    if new.phase == GamePhase::Menu && prev.phase != GamePhase::Menu {
        reward += weights.game_over;
    }

    reward
}
