//! Action codec: structured actions <-> dense action indices
//!
//! The index space is a fixed concatenation of regions:
//!
//! | Region            | Size | Encoding                                   |
//! |-------------------|------|--------------------------------------------|
//! | simple actions    | 6    | reroll, end shop, skip blind, skip pack, sort by rank, sort by suit |
//! | `PLAY_HAND`       | 1024 | bit `i - 1` set iff hand position `i` is selected |
//! | `DISCARD`         | 1024 | same bitmap scheme                         |
//! | `SHOP_BUY`        | 6    | `slot - 1`                                 |
//! | `SHOP_SELL_JOKER` | 5    | `joker_index - 1`                          |
//! | `SELECT_PACK_ITEM`| 5    | `choice_index - 1`                         |
//! | `SELECT_BLIND`    | 3    | small, big, boss                           |
//!
//! Every subset of the ten hand positions owns an index, including the empty
//! and full selections. Legality is expressed only through [`ActionCodec::mask`],
//! so the numbering never moves when selection-size rules change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::schema::{ActionRequest, CardSelection, LegalAction, LegalActionSet};

pub const MAX_HAND_SIZE: usize = 10;
pub const MAX_SHOP_SLOTS: usize = 6;
pub const MAX_JOKERS: usize = 5;
pub const MAX_PACK_CHOICES: usize = 5;
pub const BLIND_OPTION_COUNT: usize = 3;

pub const SIMPLE_ACTION_COUNT: usize = 6;
pub const CARD_SUBSET_COUNT: usize = 1 << MAX_HAND_SIZE;

pub const SHOP_REROLL_INDEX: usize = 0;
pub const SHOP_END_INDEX: usize = 1;
pub const SKIP_BLIND_INDEX: usize = 2;
pub const SKIP_PACK_INDEX: usize = 3;
pub const SORT_RANK_INDEX: usize = 4;
pub const SORT_SUIT_INDEX: usize = 5;

pub const PLAY_HAND_OFFSET: usize = SIMPLE_ACTION_COUNT;
pub const DISCARD_OFFSET: usize = PLAY_HAND_OFFSET + CARD_SUBSET_COUNT;
pub const SHOP_BUY_OFFSET: usize = DISCARD_OFFSET + CARD_SUBSET_COUNT;
pub const SELL_JOKER_OFFSET: usize = SHOP_BUY_OFFSET + MAX_SHOP_SLOTS;
pub const PACK_SELECT_OFFSET: usize = SELL_JOKER_OFFSET + MAX_JOKERS;
pub const BLIND_SELECT_OFFSET: usize = PACK_SELECT_OFFSET + MAX_PACK_CHOICES;

/// Total number of action indices
pub const ACTION_SPACE_SIZE: usize = BLIND_SELECT_OFFSET + BLIND_OPTION_COUNT;

const _: () = assert!(ACTION_SPACE_SIZE == 2073);

/// Error type for codec operations
///
/// These always indicate a caller bug (a bad index or a malformed action) and
/// are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Unknown action kind: {0}")]
    UnknownActionKind(String),
    #[error("Invalid parameter `{param}` for {kind}: {reason}")]
    InvalidParameter {
        kind: ActionKind,
        param: &'static str,
        reason: String,
    },
    #[error("Action index {index} out of range [0, {size})")]
    IndexOutOfRange { index: usize, size: usize },
}

/// The eleven action kinds the bridge understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    PlayHand,
    Discard,
    SortHand,
    ShopBuy,
    ShopReroll,
    ShopSellJoker,
    ShopEnd,
    SelectBlind,
    SkipBlind,
    SelectPackItem,
    SkipPack,
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        ActionKind::PlayHand,
        ActionKind::Discard,
        ActionKind::SortHand,
        ActionKind::ShopBuy,
        ActionKind::ShopReroll,
        ActionKind::ShopSellJoker,
        ActionKind::ShopEnd,
        ActionKind::SelectBlind,
        ActionKind::SkipBlind,
        ActionKind::SelectPackItem,
        ActionKind::SkipPack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::PlayHand => "PLAY_HAND",
            ActionKind::Discard => "DISCARD",
            ActionKind::SortHand => "SORT_HAND",
            ActionKind::ShopBuy => "SHOP_BUY",
            ActionKind::ShopReroll => "SHOP_REROLL",
            ActionKind::ShopSellJoker => "SHOP_SELL_JOKER",
            ActionKind::ShopEnd => "SHOP_END",
            ActionKind::SelectBlind => "SELECT_BLIND",
            ActionKind::SkipBlind => "SKIP_BLIND",
            ActionKind::SelectPackItem => "SELECT_PACK_ITEM",
            ActionKind::SkipPack => "SKIP_PACK",
        }
    }
}

impl FromStr for ActionKind {
    type Err = CodecError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| CodecError::UnknownActionKind(raw.to_string()))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    Rank,
    Suit,
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Rank => "rank",
            SortMode::Suit => "suit",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "rank" => Some(SortMode::Rank),
            "suit" => Some(SortMode::Suit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlindOption {
    Small,
    Big,
    Boss,
}

impl BlindOption {
    /// Fixed region order: small, big, boss
    pub const ALL: [BlindOption; BLIND_OPTION_COUNT] =
        [BlindOption::Small, BlindOption::Big, BlindOption::Boss];

    pub fn as_str(self) -> &'static str {
        match self {
            BlindOption::Small => "small",
            BlindOption::Big => "big",
            BlindOption::Boss => "boss",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "small" => Some(BlindOption::Small),
            "big" => Some(BlindOption::Big),
            "boss" => Some(BlindOption::Boss),
            _ => None,
        }
    }

    fn ordinal(self) -> usize {
        match self {
            BlindOption::Small => 0,
            BlindOption::Big => 1,
            BlindOption::Boss => 2,
        }
    }
}

/// Canonical set of selected hand positions (1-based, at most [`MAX_HAND_SIZE`])
///
/// Stored as the same 10-bit bitmap the index space uses, so order and
/// duplicates in the input never matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CardPositions(u16);

impl CardPositions {
    pub const EMPTY: CardPositions = CardPositions(0);

    /// Build from 1-based positions; fails on anything outside `1..=10`
    pub fn from_positions<I>(positions: I) -> Result<Self, CodecError>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut bitmap = 0u16;
        for position in positions {
            if position == 0 || position as usize > MAX_HAND_SIZE {
                return Err(CodecError::InvalidParameter {
                    kind: ActionKind::PlayHand,
                    param: "card_indices",
                    reason: format!("position {} outside 1..={}", position, MAX_HAND_SIZE),
                });
            }
            bitmap |= 1 << (position - 1);
        }
        Ok(CardPositions(bitmap))
    }

    /// Returns `None` for bitmaps with bits above position 10
    pub fn from_bitmap(bitmap: u16) -> Option<Self> {
        ((bitmap as usize) < CARD_SUBSET_COUNT).then_some(CardPositions(bitmap))
    }

    pub fn bitmap(self) -> u16 {
        self.0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, position: u8) -> bool {
        position >= 1 && (position as usize) <= MAX_HAND_SIZE && self.0 & (1 << (position - 1)) != 0
    }

    /// Selected positions in ascending order
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (1..=MAX_HAND_SIZE as u8).filter(move |&position| self.contains(position))
    }

    pub fn positions(self) -> Vec<u8> {
        self.iter().collect()
    }
}

/// A fully specified action, one variant per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructuredAction {
    PlayHand(CardPositions),
    Discard(CardPositions),
    SortHand(SortMode),
    ShopBuy { slot: u8 },
    ShopReroll,
    ShopSellJoker { joker_index: u8 },
    ShopEnd,
    SelectBlind(BlindOption),
    SkipBlind,
    SelectPackItem { choice_index: u8 },
    SkipPack,
}

impl StructuredAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            StructuredAction::PlayHand(_) => ActionKind::PlayHand,
            StructuredAction::Discard(_) => ActionKind::Discard,
            StructuredAction::SortHand(_) => ActionKind::SortHand,
            StructuredAction::ShopBuy { .. } => ActionKind::ShopBuy,
            StructuredAction::ShopReroll => ActionKind::ShopReroll,
            StructuredAction::ShopSellJoker { .. } => ActionKind::ShopSellJoker,
            StructuredAction::ShopEnd => ActionKind::ShopEnd,
            StructuredAction::SelectBlind(_) => ActionKind::SelectBlind,
            StructuredAction::SkipBlind => ActionKind::SkipBlind,
            StructuredAction::SelectPackItem { .. } => ActionKind::SelectPackItem,
            StructuredAction::SkipPack => ActionKind::SkipPack,
        }
    }

    /// Wire form sent to the bridge
    pub fn to_request(&self) -> ActionRequest {
        let request = ActionRequest::new(self.kind().as_str());
        match *self {
            StructuredAction::PlayHand(cards) | StructuredAction::Discard(cards) => {
                request.with_param("card_indices", cards.positions())
            }
            StructuredAction::SortHand(mode) => request.with_param("mode", mode.as_str()),
            StructuredAction::ShopBuy { slot } => request.with_param("slot", slot),
            StructuredAction::ShopSellJoker { joker_index } => {
                request.with_param("joker_index", joker_index)
            }
            StructuredAction::SelectBlind(option) => request.with_param("option", option.as_str()),
            StructuredAction::SelectPackItem { choice_index } => {
                request.with_param("choice_index", choice_index)
            }
            StructuredAction::ShopReroll
            | StructuredAction::ShopEnd
            | StructuredAction::SkipBlind
            | StructuredAction::SkipPack => request,
        }
    }
}

impl fmt::Display for StructuredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuredAction::PlayHand(cards) | StructuredAction::Discard(cards) => {
                write!(f, "{}{:?}", self.kind(), cards.positions())
            }
            StructuredAction::SortHand(mode) => write!(f, "{}({})", self.kind(), mode.as_str()),
            StructuredAction::ShopBuy { slot } => write!(f, "{}(slot={})", self.kind(), slot),
            StructuredAction::ShopSellJoker { joker_index } => {
                write!(f, "{}(joker={})", self.kind(), joker_index)
            }
            StructuredAction::SelectBlind(option) => {
                write!(f, "{}({})", self.kind(), option.as_str())
            }
            StructuredAction::SelectPackItem { choice_index } => {
                write!(f, "{}(choice={})", self.kind(), choice_index)
            }
            _ => write!(f, "{}", self.kind()),
        }
    }
}

/// Defaults applied when a loose [`ActionRequest`] omits a parameter
///
/// A `None` default means the parameter is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub default_sort_mode: Option<SortMode>,
    pub default_shop_slot: Option<u8>,
    pub default_joker_index: Option<u8>,
    pub default_choice_index: Option<u8>,
    pub default_blind: Option<BlindOption>,
}

impl CodecConfig {
    /// No defaults at all: every parameter must be present
    pub fn strict() -> Self {
        Self {
            default_sort_mode: None,
            default_shop_slot: None,
            default_joker_index: None,
            default_choice_index: None,
            default_blind: None,
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            default_sort_mode: Some(SortMode::Rank),
            default_shop_slot: Some(1),
            default_joker_index: Some(1),
            default_choice_index: Some(1),
            default_blind: Some(BlindOption::Small),
        }
    }
}

/// Bijection between [`StructuredAction`]s and `[0, ACTION_SPACE_SIZE)`
#[derive(Debug, Clone, Default)]
pub struct ActionCodec {
    config: CodecConfig,
}

impl ActionCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn action_space_size(&self) -> usize {
        ACTION_SPACE_SIZE
    }

    /// Encode a structured action to its index
    pub fn encode(&self, action: &StructuredAction) -> Result<usize, CodecError> {
        let index = match *action {
            StructuredAction::ShopReroll => SHOP_REROLL_INDEX,
            StructuredAction::ShopEnd => SHOP_END_INDEX,
            StructuredAction::SkipBlind => SKIP_BLIND_INDEX,
            StructuredAction::SkipPack => SKIP_PACK_INDEX,
            StructuredAction::SortHand(SortMode::Rank) => SORT_RANK_INDEX,
            StructuredAction::SortHand(SortMode::Suit) => SORT_SUIT_INDEX,
            StructuredAction::PlayHand(cards) => PLAY_HAND_OFFSET + cards.bitmap() as usize,
            StructuredAction::Discard(cards) => DISCARD_OFFSET + cards.bitmap() as usize,
            StructuredAction::ShopBuy { slot } => {
                SHOP_BUY_OFFSET + slot_offset(ActionKind::ShopBuy, "slot", slot, MAX_SHOP_SLOTS)?
            }
            StructuredAction::ShopSellJoker { joker_index } => {
                SELL_JOKER_OFFSET
                    + slot_offset(ActionKind::ShopSellJoker, "joker_index", joker_index, MAX_JOKERS)?
            }
            StructuredAction::SelectPackItem { choice_index } => {
                PACK_SELECT_OFFSET
                    + slot_offset(
                        ActionKind::SelectPackItem,
                        "choice_index",
                        choice_index,
                        MAX_PACK_CHOICES,
                    )?
            }
            StructuredAction::SelectBlind(option) => BLIND_SELECT_OFFSET + option.ordinal(),
        };
        debug_assert!(index < ACTION_SPACE_SIZE);
        Ok(index)
    }

    /// Parse a loose request (applying configured defaults) and encode it
    pub fn encode_request(&self, request: &ActionRequest) -> Result<usize, CodecError> {
        let action = self.parse_request(request)?;
        self.encode(&action)
    }

    /// Close a loose wire request into a [`StructuredAction`]
    pub fn parse_request(&self, request: &ActionRequest) -> Result<StructuredAction, CodecError> {
        let kind: ActionKind = request.kind.parse()?;
        let params = &request.params;

        let action = match kind {
            ActionKind::PlayHand => StructuredAction::PlayHand(card_param(kind, params)?),
            ActionKind::Discard => StructuredAction::Discard(card_param(kind, params)?),
            ActionKind::SortHand => {
                let mode = match text_param(kind, params, "mode")? {
                    Some(raw) => SortMode::from_wire(&raw).ok_or_else(|| {
                        invalid(kind, "mode", format!("unknown sort mode {:?}", raw))
                    })?,
                    None => self
                        .config
                        .default_sort_mode
                        .ok_or_else(|| missing(kind, "mode"))?,
                };
                StructuredAction::SortHand(mode)
            }
            ActionKind::ShopBuy => StructuredAction::ShopBuy {
                slot: index_param(kind, params, "slot", self.config.default_shop_slot)?,
            },
            ActionKind::ShopSellJoker => StructuredAction::ShopSellJoker {
                joker_index: index_param(
                    kind,
                    params,
                    "joker_index",
                    self.config.default_joker_index,
                )?,
            },
            ActionKind::SelectPackItem => StructuredAction::SelectPackItem {
                choice_index: index_param(
                    kind,
                    params,
                    "choice_index",
                    self.config.default_choice_index,
                )?,
            },
            ActionKind::SelectBlind => {
                let option = match text_param(kind, params, "option")? {
                    Some(raw) => BlindOption::from_wire(&raw).ok_or_else(|| {
                        invalid(kind, "option", format!("unknown blind option {:?}", raw))
                    })?,
                    None => self
                        .config
                        .default_blind
                        .ok_or_else(|| missing(kind, "option"))?,
                };
                StructuredAction::SelectBlind(option)
            }
            ActionKind::ShopReroll => StructuredAction::ShopReroll,
            ActionKind::ShopEnd => StructuredAction::ShopEnd,
            ActionKind::SkipBlind => StructuredAction::SkipBlind,
            ActionKind::SkipPack => StructuredAction::SkipPack,
        };
        Ok(action)
    }

    /// Decode an index back to its structured action
    pub fn decode(&self, index: usize) -> Result<StructuredAction, CodecError> {
        let action = match index {
            SHOP_REROLL_INDEX => StructuredAction::ShopReroll,
            SHOP_END_INDEX => StructuredAction::ShopEnd,
            SKIP_BLIND_INDEX => StructuredAction::SkipBlind,
            SKIP_PACK_INDEX => StructuredAction::SkipPack,
            SORT_RANK_INDEX => StructuredAction::SortHand(SortMode::Rank),
            SORT_SUIT_INDEX => StructuredAction::SortHand(SortMode::Suit),
            i if i < DISCARD_OFFSET => {
                StructuredAction::PlayHand(CardPositions((i - PLAY_HAND_OFFSET) as u16))
            }
            i if i < SHOP_BUY_OFFSET => {
                StructuredAction::Discard(CardPositions((i - DISCARD_OFFSET) as u16))
            }
            i if i < SELL_JOKER_OFFSET => StructuredAction::ShopBuy {
                slot: (i - SHOP_BUY_OFFSET + 1) as u8,
            },
            i if i < PACK_SELECT_OFFSET => StructuredAction::ShopSellJoker {
                joker_index: (i - SELL_JOKER_OFFSET + 1) as u8,
            },
            i if i < BLIND_SELECT_OFFSET => StructuredAction::SelectPackItem {
                choice_index: (i - PACK_SELECT_OFFSET + 1) as u8,
            },
            i if i < ACTION_SPACE_SIZE => {
                StructuredAction::SelectBlind(BlindOption::ALL[i - BLIND_SELECT_OFFSET])
            }
            _ => {
                return Err(CodecError::IndexOutOfRange {
                    index,
                    size: ACTION_SPACE_SIZE,
                })
            }
        };
        Ok(action)
    }

    /// Boolean legality mask over the whole index space
    ///
    /// `hand_size` only matters for card selections that do not list their
    /// `available` positions; an explicit `available` list always wins, since
    /// the bridge leaves out positions that cannot be picked (debuffed cards).
    pub fn mask(&self, legal: &LegalActionSet, hand_size: usize) -> Vec<bool> {
        let mut mask = vec![false; ACTION_SPACE_SIZE];

        for action in &legal.actions {
            match action {
                LegalAction::ShopReroll => mask[SHOP_REROLL_INDEX] = true,
                LegalAction::ShopEnd => mask[SHOP_END_INDEX] = true,
                LegalAction::SkipBlind => mask[SKIP_BLIND_INDEX] = true,
                LegalAction::SkipPack => mask[SKIP_PACK_INDEX] = true,
                LegalAction::SortHand { modes } => {
                    if modes.is_empty() || modes.contains(&SortMode::Rank) {
                        mask[SORT_RANK_INDEX] = true;
                    }
                    if modes.is_empty() || modes.contains(&SortMode::Suit) {
                        mask[SORT_SUIT_INDEX] = true;
                    }
                }
                LegalAction::PlayHand(Some(selection)) => mark_selections(
                    &mut mask[PLAY_HAND_OFFSET..DISCARD_OFFSET],
                    selection,
                    hand_size,
                ),
                LegalAction::Discard(Some(selection)) => mark_selections(
                    &mut mask[DISCARD_OFFSET..SHOP_BUY_OFFSET],
                    selection,
                    hand_size,
                ),
                LegalAction::PlayHand(None) | LegalAction::Discard(None) => {
                    trace!(kind = %action.kind(), "card selection without card_indices, nothing marked");
                }
                LegalAction::ShopBuy { slot, .. } => {
                    mark_slot(&mut mask[SHOP_BUY_OFFSET..SELL_JOKER_OFFSET], *slot)
                }
                LegalAction::ShopSellJoker { joker_index, .. } => {
                    mark_slot(&mut mask[SELL_JOKER_OFFSET..PACK_SELECT_OFFSET], *joker_index)
                }
                LegalAction::SelectPackItem { choice_index } => {
                    mark_slot(&mut mask[PACK_SELECT_OFFSET..BLIND_SELECT_OFFSET], *choice_index)
                }
                LegalAction::SelectBlind { .. } => {
                    mask[BLIND_SELECT_OFFSET..ACTION_SPACE_SIZE].fill(true);
                }
            }
        }

        mask
    }

    /// Indices set in [`ActionCodec::mask`], ascending
    pub fn legal_indices(&self, legal: &LegalActionSet, hand_size: usize) -> Vec<usize> {
        self.mask(legal, hand_size)
            .into_iter()
            .enumerate()
            .filter_map(|(index, legal)| legal.then_some(index))
            .collect()
    }
}

fn slot_offset(
    kind: ActionKind,
    param: &'static str,
    one_based: u8,
    region_len: usize,
) -> Result<usize, CodecError> {
    if one_based == 0 || one_based as usize > region_len {
        return Err(invalid(
            kind,
            param,
            format!("{} outside 1..={}", one_based, region_len),
        ));
    }
    Ok(one_based as usize - 1)
}

fn mark_slot(region: &mut [bool], one_based: Option<u8>) {
    match one_based {
        Some(slot) if slot >= 1 && slot as usize <= region.len() => region[slot as usize - 1] = true,
        Some(slot) => trace!(slot, region_len = region.len(), "ignoring legal slot outside region"),
        None => {}
    }
}

/// Mark every subset of the available positions whose size is within
/// `[min_select, max_select]`
fn mark_selections(region: &mut [bool], selection: &CardSelection, hand_size: usize) {
    debug_assert_eq!(region.len(), CARD_SUBSET_COUNT);

    let mut available: Vec<u8> = match &selection.available {
        Some(positions) => positions
            .iter()
            .copied()
            .filter(|&position| position >= 1 && position as usize <= MAX_HAND_SIZE)
            .collect(),
        None => (1..=hand_size.min(MAX_HAND_SIZE) as u8).collect(),
    };
    available.sort_unstable();
    available.dedup();

    let max_select = selection.max_select.min(available.len());
    if selection.min_select > max_select {
        return;
    }

    // At most 2^10 subsets of the available positions
    for subset in 0u32..(1 << available.len()) {
        let size = subset.count_ones() as usize;
        if size < selection.min_select || size > max_select {
            continue;
        }
        let bitmap = available
            .iter()
            .enumerate()
            .filter(|(bit, _)| subset & (1 << bit) != 0)
            .fold(0usize, |bitmap, (_, &position)| bitmap | 1 << (position - 1));
        region[bitmap] = true;
    }
}

fn card_param(kind: ActionKind, params: &Map<String, Value>) -> Result<CardPositions, CodecError> {
    let raw = match params.get("card_indices") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Err(missing(kind, "card_indices")),
        Some(other) => {
            return Err(invalid(
                kind,
                "card_indices",
                format!("expected a list of positions, got {}", other),
            ))
        }
    };

    let positions = raw
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|position| u8::try_from(position).ok())
                .ok_or_else(|| invalid(kind, "card_indices", format!("bad position {}", item)))
        })
        .collect::<Result<Vec<u8>, _>>()?;

    CardPositions::from_positions(positions).map_err(|err| match err {
        CodecError::InvalidParameter { reason, .. } => invalid(kind, "card_indices", reason),
        other => other,
    })
}

fn index_param(
    kind: ActionKind,
    params: &Map<String, Value>,
    param: &'static str,
    default: Option<u8>,
) -> Result<u8, CodecError> {
    match params.get(param) {
        Some(Value::Null) | None => default.ok_or_else(|| missing(kind, param)),
        Some(value) => value
            .as_u64()
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| invalid(kind, param, format!("expected a positive index, got {}", value))),
    }
}

fn text_param(
    kind: ActionKind,
    params: &Map<String, Value>,
    param: &'static str,
) -> Result<Option<String>, CodecError> {
    match params.get(param) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(invalid(kind, param, format!("expected a string, got {}", other))),
    }
}

fn missing(kind: ActionKind, param: &'static str) -> CodecError {
    invalid(kind, param, "missing and no default configured".to_string())
}

fn invalid(kind: ActionKind, param: &'static str, reason: String) -> CodecError {
    CodecError::InvalidParameter {
        kind,
        param,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::GamePhase;

    fn legal_set(actions: Vec<LegalAction>) -> LegalActionSet {
        LegalActionSet {
            schema_version: "1".to_string(),
            phase: GamePhase::Unknown,
            actions,
            error: None,
        }
    }

    fn cards(positions: &[u8]) -> CardPositions {
        CardPositions::from_positions(positions.iter().copied()).unwrap()
    }

    #[test]
    fn test_region_layout() {
        assert_eq!(PLAY_HAND_OFFSET, 6);
        assert_eq!(DISCARD_OFFSET, 1030);
        assert_eq!(SHOP_BUY_OFFSET, 2054);
        assert_eq!(SELL_JOKER_OFFSET, 2060);
        assert_eq!(PACK_SELECT_OFFSET, 2065);
        assert_eq!(BLIND_SELECT_OFFSET, 2070);
        assert_eq!(ACTION_SPACE_SIZE, 2073);
    }

    #[test]
    fn test_encode_simple_actions() {
        let codec = ActionCodec::default();
        assert_eq!(codec.encode(&StructuredAction::ShopReroll).unwrap(), 0);
        assert_eq!(codec.encode(&StructuredAction::ShopEnd).unwrap(), 1);
        assert_eq!(codec.encode(&StructuredAction::SkipBlind).unwrap(), 2);
        assert_eq!(codec.encode(&StructuredAction::SkipPack).unwrap(), 3);
        assert_eq!(codec.encode(&StructuredAction::SortHand(SortMode::Rank)).unwrap(), 4);
        assert_eq!(codec.encode(&StructuredAction::SortHand(SortMode::Suit)).unwrap(), 5);
    }

    #[test]
    fn test_encode_card_bitmap() {
        let codec = ActionCodec::default();
        // positions 1 and 3 -> bits 0 and 2 -> 0b101
        let play = StructuredAction::PlayHand(cards(&[3, 1]));
        assert_eq!(codec.encode(&play).unwrap(), PLAY_HAND_OFFSET + 5);

        let discard = StructuredAction::Discard(cards(&[10]));
        assert_eq!(codec.encode(&discard).unwrap(), DISCARD_OFFSET + 512);

        let empty = StructuredAction::PlayHand(CardPositions::EMPTY);
        assert_eq!(codec.encode(&empty).unwrap(), PLAY_HAND_OFFSET);
    }

    #[test]
    fn test_encode_parameterized_actions() {
        let codec = ActionCodec::default();
        assert_eq!(codec.encode(&StructuredAction::ShopBuy { slot: 1 }).unwrap(), 2054);
        assert_eq!(codec.encode(&StructuredAction::ShopBuy { slot: 6 }).unwrap(), 2059);
        assert_eq!(
            codec.encode(&StructuredAction::ShopSellJoker { joker_index: 5 }).unwrap(),
            2064
        );
        assert_eq!(
            codec.encode(&StructuredAction::SelectPackItem { choice_index: 1 }).unwrap(),
            2065
        );
        assert_eq!(codec.encode(&StructuredAction::SelectBlind(BlindOption::Boss)).unwrap(), 2072);
    }

    #[test]
    fn test_encode_rejects_out_of_region_parameters() {
        let codec = ActionCodec::default();
        for action in [
            StructuredAction::ShopBuy { slot: 0 },
            StructuredAction::ShopBuy { slot: 7 },
            StructuredAction::ShopSellJoker { joker_index: 6 },
            StructuredAction::SelectPackItem { choice_index: 0 },
        ] {
            match codec.encode(&action) {
                Err(CodecError::InvalidParameter { kind, .. }) => assert_eq!(kind, action.kind()),
                other => panic!("Expected InvalidParameter for {:?}, got {:?}", action, other),
            }
        }
    }

    #[test]
    fn test_card_positions_reject_out_of_range() {
        assert!(CardPositions::from_positions([0u8]).is_err());
        assert!(CardPositions::from_positions([11u8]).is_err());
        assert_eq!(cards(&[2, 2, 1]).positions(), vec![1, 2]);
        assert_eq!(CardPositions::from_bitmap(1024), None);
    }

    #[test]
    fn test_every_index_round_trips() {
        let codec = ActionCodec::default();
        for index in 0..ACTION_SPACE_SIZE {
            let action = codec.decode(index).unwrap();
            assert_eq!(codec.encode(&action).unwrap(), index, "index {} via {}", index, action);
        }
    }

    #[test]
    fn test_decode_out_of_range() {
        let codec = ActionCodec::default();
        assert_eq!(
            codec.decode(ACTION_SPACE_SIZE),
            Err(CodecError::IndexOutOfRange {
                index: 2073,
                size: 2073
            })
        );
    }

    #[test]
    fn test_decode_regions() {
        let codec = ActionCodec::default();
        assert_eq!(
            codec.decode(PLAY_HAND_OFFSET + 0b11).unwrap(),
            StructuredAction::PlayHand(cards(&[1, 2]))
        );
        assert_eq!(
            codec.decode(DISCARD_OFFSET + 1023).unwrap(),
            StructuredAction::Discard(cards(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]))
        );
        assert_eq!(codec.decode(2056).unwrap(), StructuredAction::ShopBuy { slot: 3 });
        assert_eq!(
            codec.decode(2070).unwrap(),
            StructuredAction::SelectBlind(BlindOption::Small)
        );
    }

    #[test]
    fn test_parse_request_unknown_kind() {
        let codec = ActionCodec::default();
        let request = ActionRequest::new("USE_CONSUMABLE");
        assert_eq!(
            codec.encode_request(&request),
            Err(CodecError::UnknownActionKind("USE_CONSUMABLE".to_string()))
        );
    }

    #[test]
    fn test_parse_request_applies_configured_defaults() {
        let codec = ActionCodec::default();
        assert_eq!(
            codec.parse_request(&ActionRequest::new("SHOP_BUY")).unwrap(),
            StructuredAction::ShopBuy { slot: 1 }
        );
        assert_eq!(
            codec.parse_request(&ActionRequest::new("SORT_HAND")).unwrap(),
            StructuredAction::SortHand(SortMode::Rank)
        );
        assert_eq!(
            codec.parse_request(&ActionRequest::new("SELECT_BLIND")).unwrap(),
            StructuredAction::SelectBlind(BlindOption::Small)
        );
    }

    #[test]
    fn test_strict_config_requires_parameters() {
        let codec = ActionCodec::new(CodecConfig::strict());
        match codec.parse_request(&ActionRequest::new("SHOP_SELL_JOKER")) {
            Err(CodecError::InvalidParameter { kind, param, .. }) => {
                assert_eq!(kind, ActionKind::ShopSellJoker);
                assert_eq!(param, "joker_index");
            }
            other => panic!("Expected InvalidParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_card_requests_require_indices() {
        let codec = ActionCodec::default();
        assert!(matches!(
            codec.parse_request(&ActionRequest::new("PLAY_HAND")),
            Err(CodecError::InvalidParameter { param: "card_indices", .. })
        ));

        let request = ActionRequest::new("DISCARD").with_param("card_indices", vec![4, 2]);
        assert_eq!(codec.encode_request(&request).unwrap(), DISCARD_OFFSET + 0b1010);

        let request = ActionRequest::new("PLAY_HAND").with_param("card_indices", vec![12]);
        assert!(matches!(
            codec.parse_request(&request),
            Err(CodecError::InvalidParameter { kind: ActionKind::PlayHand, .. })
        ));
    }

    #[test]
    fn test_request_round_trip_through_wire_form() {
        let codec = ActionCodec::new(CodecConfig::strict());
        for index in [0, 5, 6, 100, 1030, 2000, 2054, 2062, 2066, 2071] {
            let action = codec.decode(index).unwrap();
            let parsed = codec.parse_request(&action.to_request()).unwrap();
            assert_eq!(parsed, action);
        }
    }

    #[test]
    fn test_mask_select_blind_only() {
        let codec = ActionCodec::default();
        let legal = legal_set(vec![LegalAction::SelectBlind { options: vec![] }]);
        let mask = codec.mask(&legal, 8);

        assert_eq!(mask.len(), ACTION_SPACE_SIZE);
        assert_eq!(mask.iter().filter(|&&legal| legal).count(), 3);
        assert!(mask[BLIND_SELECT_OFFSET..ACTION_SPACE_SIZE].iter().all(|&legal| legal));
    }

    #[test]
    fn test_mask_play_hand_combinations() {
        let codec = ActionCodec::default();
        let legal = legal_set(vec![LegalAction::PlayHand(Some(CardSelection {
            available: Some(vec![1, 2, 3]),
            min_select: 1,
            max_select: 2,
        }))]);
        let indices = codec.legal_indices(&legal, 8);

        // C(3,1) + C(3,2)
        assert_eq!(indices.len(), 6);
        assert!(indices
            .iter()
            .all(|&index| (PLAY_HAND_OFFSET..DISCARD_OFFSET).contains(&index)));
        assert!(indices.contains(&(PLAY_HAND_OFFSET + 0b011)));
        assert!(!indices.contains(&(PLAY_HAND_OFFSET + 0b111)));
    }

    #[test]
    fn test_mask_available_overrides_hand_size() {
        let codec = ActionCodec::default();
        // Position 2 is debuffed and left out by the bridge
        let legal = legal_set(vec![LegalAction::Discard(Some(CardSelection {
            available: Some(vec![1, 3, 4]),
            min_select: 1,
            max_select: 5,
        }))]);
        let indices = codec.legal_indices(&legal, 8);

        assert_eq!(indices.len(), 7);
        for index in indices {
            let action = codec.decode(index).unwrap();
            match action {
                StructuredAction::Discard(cards) => assert!(!cards.contains(2)),
                other => panic!("Expected discard, got {}", other),
            }
        }
    }

    #[test]
    fn test_mask_defaults_to_hand_size() {
        let codec = ActionCodec::default();
        let legal = legal_set(vec![LegalAction::PlayHand(Some(CardSelection::default()))]);
        // 8 cards, 1..=5 selected: 8 + 28 + 56 + 70 + 56
        assert_eq!(codec.legal_indices(&legal, 8).len(), 218);
        // hand size beyond the index space is clamped to ten positions
        assert_eq!(codec.legal_indices(&legal, 12).len(), 637);
    }

    #[test]
    fn test_mask_card_selection_without_indices() {
        let codec = ActionCodec::default();
        let legal = legal_set(vec![LegalAction::PlayHand(None), LegalAction::Discard(None)]);
        assert!(codec.legal_indices(&legal, 8).is_empty());
    }

    #[test]
    fn test_mask_shop_slots() {
        let codec = ActionCodec::default();
        let legal = legal_set(vec![
            LegalAction::ShopBuy { slot: Some(2), cost: Some(5) },
            LegalAction::ShopBuy { slot: Some(9), cost: Some(5) },
            LegalAction::ShopBuy { slot: None, cost: None },
            LegalAction::ShopSellJoker { joker_index: Some(1), sell_value: Some(2) },
            LegalAction::ShopReroll,
            LegalAction::ShopEnd,
        ]);
        assert_eq!(
            codec.legal_indices(&legal, 0),
            vec![SHOP_REROLL_INDEX, SHOP_END_INDEX, SHOP_BUY_OFFSET + 1, SELL_JOKER_OFFSET]
        );
    }

    #[test]
    fn test_mask_sort_modes() {
        let codec = ActionCodec::default();
        let both = legal_set(vec![LegalAction::SortHand { modes: vec![] }]);
        assert_eq!(codec.legal_indices(&both, 8), vec![SORT_RANK_INDEX, SORT_SUIT_INDEX]);

        let suit_only = legal_set(vec![LegalAction::SortHand { modes: vec![SortMode::Suit] }]);
        assert_eq!(codec.legal_indices(&suit_only, 8), vec![SORT_SUIT_INDEX]);
    }

    #[test]
    fn test_mask_inverted_bounds_marks_nothing() {
        let codec = ActionCodec::default();
        let legal = legal_set(vec![LegalAction::PlayHand(Some(CardSelection {
            available: Some(vec![1, 2]),
            min_select: 3,
            max_select: 5,
        }))]);
        assert!(codec.legal_indices(&legal, 8).is_empty());
    }
}
