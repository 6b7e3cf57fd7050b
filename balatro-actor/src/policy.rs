use anyhow::{anyhow, Result};
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;

/// Trait for action selection policies
pub trait Policy: Send + Sync {
    /// Select an action index given an observation and the current legality mask
    fn select_action(&mut self, observation: &[f32], mask: &[bool]) -> Result<usize>;
}

/// Uniform over legal actions; uniform over the whole space when nothing is legal
pub struct MaskedRandomPolicy {
    rng: ChaCha20Rng,
}

impl MaskedRandomPolicy {
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl Default for MaskedRandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for MaskedRandomPolicy {
    fn select_action(&mut self, _observation: &[f32], mask: &[bool]) -> Result<usize> {
        if mask.is_empty() {
            return Err(anyhow!("Action mask must not be empty"));
        }

        let legal: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(index, &legal)| legal.then_some(index))
            .collect();

        match legal.choose(&mut self.rng) {
            Some(&index) => Ok(index),
            // Nothing legal: the bridge will reject whatever we pick
            None => Ok(self.rng.gen_range(0..mask.len())),
        }
    }
}
