//! State featurizer: [`GameState`] -> fixed-length `f32` observation
//!
//! Layout (136 floats):
//! - `[0, 10)`    scalars: phase, money, ante, round, hands, discards,
//!                log chips needed, log chips scored, deck size, discard size
//! - `[10, 90)`   10 hand cards x 8
//! - `[90, 110)`  5 jokers x 4
//! - `[110, 118)` 4 consumables x 2
//! - `[118, 136)` 6 shop slots x 3
//!
//! Short sequences are zero-padded. Long sequences are truncated: only the
//! first N items of each block are encoded and the rest are dropped.

use std::hash::Hasher;

use rustc_hash::FxHasher;

use crate::schema::{Card, Consumable, GameState, Joker, ShopItem};

pub const SCALAR_FEATURES: usize = 10;

pub const HAND_SLOTS: usize = 10;
pub const CARD_FEATURES: usize = 8;

pub const JOKER_SLOTS: usize = 5;
pub const JOKER_FEATURES: usize = 4;

pub const CONSUMABLE_SLOTS: usize = 4;
pub const CONSUMABLE_FEATURES: usize = 2;

pub const SHOP_SLOTS: usize = 6;
pub const SHOP_FEATURES: usize = 3;

pub const HAND_OFFSET: usize = SCALAR_FEATURES;
pub const JOKER_OFFSET: usize = HAND_OFFSET + HAND_SLOTS * CARD_FEATURES;
pub const CONSUMABLE_OFFSET: usize = JOKER_OFFSET + JOKER_SLOTS * JOKER_FEATURES;
pub const SHOP_OFFSET: usize = CONSUMABLE_OFFSET + CONSUMABLE_SLOTS * CONSUMABLE_FEATURES;

/// Observation length
pub const OBSERVATION_DIM: usize = SHOP_OFFSET + SHOP_SLOTS * SHOP_FEATURES;

const _: () = assert!(OBSERVATION_DIM == 136);

pub const ENHANCEMENT_BUCKETS: u64 = 15;
pub const JOKER_BUCKETS: u64 = 200;
pub const CONSUMABLE_BUCKETS: u64 = 100;
pub const SHOP_TYPE_BUCKETS: u64 = 10;

const MONEY_CAP: f32 = 500.0;
const LOG_CHIPS_SCALE: f32 = 12.0;

/// Process-independent hash bucket for categorical identities
///
/// Distinct identities may share a bucket; the features are a lossy
/// compression of the identity, not a lookup table.
pub fn stable_bucket(identity: &str, buckets: u64) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(identity.as_bytes());
    hasher.finish() % buckets
}

fn bucket_feature(identity: &str, buckets: u64) -> f32 {
    stable_bucket(identity, buckets) as f32 / buckets as f32
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn log_chips(chips: i64) -> f32 {
    (chips.max(1) as f64).log10() as f32 / LOG_CHIPS_SCALE
}

/// 2..=14, or 0 when unrecognized
pub fn rank_value(rank: &str) -> u32 {
    match rank.trim() {
        "J" | "Jack" => 11,
        "Q" | "Queen" => 12,
        "K" | "King" => 13,
        "A" | "Ace" => 14,
        numeric => numeric.parse().unwrap_or(0),
    }
}

pub fn suit_value(suit: &str) -> u32 {
    match suit {
        "Hearts" => 1,
        "Diamonds" => 2,
        "Clubs" => 3,
        "Spades" => 4,
        _ => 0,
    }
}

pub fn edition_value(edition: &str) -> u32 {
    match edition.to_ascii_lowercase().as_str() {
        "foil" => 1,
        "holo" => 2,
        "polychrome" => 3,
        "negative" => 4,
        _ => 0,
    }
}

pub fn seal_value(seal: &str) -> u32 {
    match seal {
        "Gold" => 1,
        "Red" => 2,
        "Blue" => 3,
        "Purple" => 4,
        _ => 0,
    }
}

/// Stateless featurizer; every method is pure and total
#[derive(Debug, Clone, Copy, Default)]
pub struct StateFeaturizer;

impl StateFeaturizer {
    pub fn new() -> Self {
        Self
    }

    pub fn observation_dim(&self) -> usize {
        OBSERVATION_DIM
    }

    /// Encode one state into a fresh `OBSERVATION_DIM` vector
    pub fn tokenize(&self, state: &GameState) -> Vec<f32> {
        let mut out = Vec::with_capacity(OBSERVATION_DIM);
        self.tokenize_into(state, &mut out);
        out
    }

    /// Row-major `[states.len() x OBSERVATION_DIM]` batch
    pub fn tokenize_batch(&self, states: &[GameState]) -> Vec<f32> {
        let mut out = Vec::with_capacity(states.len() * OBSERVATION_DIM);
        for state in states {
            self.tokenize_into(state, &mut out);
        }
        out
    }

    /// Append exactly `OBSERVATION_DIM` values to `out`
    pub fn tokenize_into(&self, state: &GameState, out: &mut Vec<f32>) {
        let start = out.len();

        out.extend_from_slice(&scalar_features(state));
        debug_assert_eq!(out.len() - start, HAND_OFFSET);

        // Cards past position 10 are dropped
        encode_slots(out, &state.hand, HAND_SLOTS, card_features);
        debug_assert_eq!(out.len() - start, JOKER_OFFSET);

        // Jokers past the fifth are dropped
        encode_slots(out, &state.jokers, JOKER_SLOTS, joker_features);
        debug_assert_eq!(out.len() - start, CONSUMABLE_OFFSET);

        encode_slots(out, &state.consumables, CONSUMABLE_SLOTS, consumable_features);
        debug_assert_eq!(out.len() - start, SHOP_OFFSET);

        let money = state.money;
        encode_slots(out, state.shop_items(), SHOP_SLOTS, |item| {
            shop_features(item, money)
        });
        debug_assert_eq!(out.len() - start, OBSERVATION_DIM);
    }
}

fn encode_slots<T, const N: usize>(
    out: &mut Vec<f32>,
    items: &[T],
    slots: usize,
    features: impl Fn(&T) -> [f32; N],
) {
    for item in items.iter().take(slots) {
        out.extend_from_slice(&features(item));
    }
    let padding = slots.saturating_sub(items.len());
    out.extend(std::iter::repeat(0.0).take(padding * N));
}

fn scalar_features(state: &GameState) -> [f32; SCALAR_FEATURES] {
    [
        state.phase.ordinal() as f32 / 10.0,
        state.money.min(MONEY_CAP as i64) as f32 / MONEY_CAP,
        state.ante as f32 / 8.0,
        state.round as f32 / 32.0,
        state.hands_remaining as f32 / 5.0,
        state.discards_remaining as f32 / 5.0,
        log_chips(state.chips_needed().unwrap_or(0)),
        log_chips(state.chips_scored()),
        state.deck_counts.deck_size as f32 / 52.0,
        state.deck_counts.discard_size as f32 / 52.0,
    ]
}

fn card_features(card: &Card) -> [f32; CARD_FEATURES] {
    let rank = card.rank.as_deref().map_or(0, rank_value);
    let suit = card.suit.as_deref().map_or(0, suit_value);
    let edition = card.edition.as_deref().map_or(0, edition_value);
    let enhancement = match card.enhancement.as_deref() {
        Some(enhancement) if !enhancement.is_empty() => {
            bucket_feature(enhancement, ENHANCEMENT_BUCKETS)
        }
        _ => 0.0,
    };
    let seal = card.seal.as_deref().map_or(0, seal_value);

    [
        rank as f32 / 14.0,
        suit as f32 / 4.0,
        edition as f32 / 4.0,
        enhancement,
        seal as f32 / 4.0,
        flag(card.debuffed),
        flag(card.highlighted),
        card.hand_index.unwrap_or(0) as f32 / HAND_SLOTS as f32,
    ]
}

fn joker_features(joker: &Joker) -> [f32; JOKER_FEATURES] {
    [
        bucket_feature(joker.identity(), JOKER_BUCKETS),
        joker.rarity.unwrap_or(1) as f32 / 4.0,
        joker.sell_cost as f32 / 20.0,
        flag(joker.has_ability_data()),
    ]
}

fn consumable_features(consumable: &Consumable) -> [f32; CONSUMABLE_FEATURES] {
    [bucket_feature(consumable.identity(), CONSUMABLE_BUCKETS), 1.0]
}

fn shop_features(item: &ShopItem, money: i64) -> [f32; SHOP_FEATURES] {
    [
        bucket_feature(&item.kind, SHOP_TYPE_BUCKETS),
        item.cost as f32 / 50.0,
        flag(item.cost <= money),
    ]
}
