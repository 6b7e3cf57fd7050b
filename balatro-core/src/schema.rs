//! Typed data model for bridge payloads
//!
//! The bridge speaks loosely shaped JSON produced by a Lua mod: empty tables
//! arrive as `{}` instead of `[]`, identifiers are sometimes numbers and
//! sometimes strings, and numeric counters occasionally show up as floats.
//! Everything is decoded here exactly once into closed, strongly typed
//! structures; the codec and featurizer never look at raw JSON.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::action::{ActionKind, BlindOption, SortMode};

/// Game phase reported by the bridge
///
/// Unrecognized phase strings (including the raw `STATE_N` values the game
/// uses for internal states) collapse to [`GamePhase::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum GamePhase {
    Menu,
    Splash,
    SelectingHand,
    HandPlayed,
    DrawToHand,
    BlindSelect,
    Shop,
    PackOpening,
    #[default]
    Unknown,
}

impl GamePhase {
    pub const ALL: [GamePhase; 9] = [
        GamePhase::Menu,
        GamePhase::Splash,
        GamePhase::SelectingHand,
        GamePhase::HandPlayed,
        GamePhase::DrawToHand,
        GamePhase::BlindSelect,
        GamePhase::Shop,
        GamePhase::PackOpening,
        GamePhase::Unknown,
    ];

    /// Stable ordinal used by the featurizer (MENU = 0 .. UNKNOWN = 8)
    pub fn ordinal(self) -> usize {
        match self {
            GamePhase::Menu => 0,
            GamePhase::Splash => 1,
            GamePhase::SelectingHand => 2,
            GamePhase::HandPlayed => 3,
            GamePhase::DrawToHand => 4,
            GamePhase::BlindSelect => 5,
            GamePhase::Shop => 6,
            GamePhase::PackOpening => 7,
            GamePhase::Unknown => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GamePhase::Menu => "MENU",
            GamePhase::Splash => "SPLASH",
            GamePhase::SelectingHand => "SELECTING_HAND",
            GamePhase::HandPlayed => "HAND_PLAYED",
            GamePhase::DrawToHand => "DRAW_TO_HAND",
            GamePhase::BlindSelect => "BLIND_SELECT",
            GamePhase::Shop => "SHOP",
            GamePhase::PackOpening => "PACK_OPENING",
            GamePhase::Unknown => "UNKNOWN",
        }
    }

    /// Whether the phase is one where the player is expected to act
    pub fn is_decision_point(self) -> bool {
        matches!(
            self,
            GamePhase::SelectingHand
                | GamePhase::Shop
                | GamePhase::BlindSelect
                | GamePhase::PackOpening
        )
    }

    /// Phases the environment treats as "the run is over"
    pub fn is_out_of_run(self) -> bool {
        matches!(self, GamePhase::Menu | GamePhase::Splash)
    }
}

impl From<String> for GamePhase {
    fn from(raw: String) -> Self {
        GamePhase::from(raw.as_str())
    }
}

impl From<&str> for GamePhase {
    fn from(raw: &str) -> Self {
        GamePhase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == raw)
            .unwrap_or(GamePhase::Unknown)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playing card in hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Card {
    #[serde(deserialize_with = "de::lenient_string")]
    pub id: String,
    /// Raw rank as reported (`"10"`, `"Jack"`, `"K"`, or a bare number)
    #[serde(deserialize_with = "de::opt_lenient_string")]
    pub rank: Option<String>,
    pub suit: Option<String>,
    pub name: Option<String>,
    pub edition: Option<String>,
    pub enhancement: Option<String>,
    pub seal: Option<String>,
    pub debuffed: bool,
    pub facing: String,
    pub highlighted: bool,
    #[serde(deserialize_with = "de::opt_lenient_num")]
    pub hand_index: Option<u32>,
    #[serde(deserialize_with = "de::opt_lenient_num")]
    pub area_index: Option<u32>,
}

impl Default for Card {
    fn default() -> Self {
        Self {
            id: String::new(),
            rank: None,
            suit: None,
            name: None,
            edition: None,
            enhancement: None,
            seal: None,
            debuffed: false,
            facing: "front".to_string(),
            highlighted: false,
            hand_index: None,
            area_index: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Joker {
    #[serde(deserialize_with = "de::lenient_string")]
    pub id: String,
    pub name: Option<String>,
    pub key: Option<String>,
    #[serde(deserialize_with = "de::opt_lenient_num")]
    pub rarity: Option<u8>,
    #[serde(deserialize_with = "de::lenient_int")]
    pub sell_cost: i64,
    pub ability: Option<Value>,
    pub edition: Option<Value>,
    #[serde(deserialize_with = "de::opt_lenient_num")]
    pub joker_index: Option<u32>,
    #[serde(deserialize_with = "de::opt_lenient_num")]
    pub area_index: Option<u32>,
}

impl Joker {
    /// Key if present, otherwise name, otherwise empty
    pub fn identity(&self) -> &str {
        self.key.as_deref().or(self.name.as_deref()).unwrap_or("")
    }

    /// True only when the bridge sent a non-empty ability table
    pub fn has_ability_data(&self) -> bool {
        match &self.ability {
            Some(Value::Object(table)) => !table.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        }
    }
}

/// Tarot, planet or spectral card
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Consumable {
    #[serde(deserialize_with = "de::lenient_num")]
    pub index: u32,
    pub name: Option<String>,
    pub key: Option<String>,
}

impl Consumable {
    pub fn identity(&self) -> &str {
        self.key.as_deref().or(self.name.as_deref()).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Blind {
    pub name: Option<String>,
    #[serde(deserialize_with = "de::opt_lenient_int")]
    pub chips_needed: Option<i64>,
    #[serde(deserialize_with = "de::lenient_int")]
    pub chips_scored: i64,
    pub boss: bool,
    pub debuff_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopItem {
    #[serde(deserialize_with = "de::lenient_num")]
    pub slot: u32,
    pub name: Option<String>,
    #[serde(deserialize_with = "de::lenient_int")]
    pub cost: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for ShopItem {
    fn default() -> Self {
        Self {
            slot: 0,
            name: None,
            cost: 0,
            kind: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shop {
    #[serde(deserialize_with = "de::lenient_list")]
    pub items: Vec<ShopItem>,
    #[serde(deserialize_with = "de::lenient_int")]
    pub reroll_cost: i64,
}

impl Default for Shop {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            reroll_cost: 5,
        }
    }
}

/// Booster pack contents, kept raw since nothing downstream featurizes them
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Pack {
    #[serde(deserialize_with = "de::lenient_list")]
    pub cards: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckCounts {
    #[serde(deserialize_with = "de::lenient_num")]
    pub deck_size: u32,
    #[serde(deserialize_with = "de::lenient_num")]
    pub discard_size: u32,
}

/// Poker hand upgrade level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandLevel {
    #[serde(deserialize_with = "de::lenient_num")]
    pub level: u32,
    pub mult: Option<f64>,
    #[serde(deserialize_with = "de::opt_lenient_int")]
    pub chips: Option<i64>,
}

impl Default for HandLevel {
    fn default() -> Self {
        Self {
            level: 1,
            mult: None,
            chips: None,
        }
    }
}

/// Complete game snapshot
///
/// `phase` is always defined and every list field is a (possibly empty)
/// sequence, whatever the bridge actually sent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameState {
    pub schema_version: String,
    #[serde(deserialize_with = "de::lenient_num")]
    pub timestamp_ms: u64,
    pub phase: GamePhase,
    pub error: Option<String>,

    #[serde(deserialize_with = "de::opt_lenient_string")]
    pub run_id: Option<String>,
    #[serde(deserialize_with = "de::lenient_int")]
    pub round: i64,
    #[serde(deserialize_with = "de::lenient_int")]
    pub ante: i64,

    #[serde(deserialize_with = "de::lenient_int")]
    pub money: i64,
    #[serde(deserialize_with = "de::lenient_int")]
    pub hands_remaining: i64,
    #[serde(deserialize_with = "de::lenient_int")]
    pub discards_remaining: i64,
    #[serde(deserialize_with = "de::lenient_int")]
    pub hands_played: i64,

    pub blind: Option<Blind>,

    #[serde(deserialize_with = "de::lenient_list")]
    pub hand: Vec<Card>,
    #[serde(deserialize_with = "de::lenient_list")]
    pub jokers: Vec<Joker>,
    #[serde(deserialize_with = "de::lenient_list")]
    pub consumables: Vec<Consumable>,

    pub shop: Option<Shop>,
    pub pack: Option<Pack>,

    pub deck_counts: DeckCounts,
    pub hand_levels: BTreeMap<String, HandLevel>,
}

impl GameState {
    pub fn is_decision_point(&self) -> bool {
        self.phase.is_decision_point()
    }

    pub fn blind_name(&self) -> Option<&str> {
        self.blind.as_ref().and_then(|blind| blind.name.as_deref())
    }

    pub fn chips_scored(&self) -> i64 {
        self.blind.as_ref().map_or(0, |blind| blind.chips_scored)
    }

    pub fn chips_needed(&self) -> Option<i64> {
        self.blind.as_ref().and_then(|blind| blind.chips_needed)
    }

    pub fn shop_items(&self) -> &[ShopItem] {
        self.shop.as_ref().map_or(&[], |shop| shop.items.as_slice())
    }
}

/// Card-selection domain of a `PLAY_HAND` or `DISCARD` legal entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSelection {
    /// Selectable 1-based positions; `None` means every position in hand
    pub available: Option<Vec<u8>>,
    pub min_select: usize,
    pub max_select: usize,
}

impl Default for CardSelection {
    fn default() -> Self {
        Self {
            available: None,
            min_select: 1,
            max_select: 5,
        }
    }
}

/// One permitted action kind together with its parameter domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegalAction {
    /// `None` when the bridge did not describe which cards may be selected
    PlayHand(Option<CardSelection>),
    Discard(Option<CardSelection>),
    SortHand { modes: Vec<SortMode> },
    ShopBuy { slot: Option<u8>, cost: Option<i64> },
    ShopReroll,
    ShopSellJoker { joker_index: Option<u8>, sell_value: Option<i64> },
    ShopEnd,
    SelectBlind { options: Vec<BlindOption> },
    SkipBlind,
    SelectPackItem { choice_index: Option<u8> },
    SkipPack,
}

impl LegalAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            LegalAction::PlayHand(_) => ActionKind::PlayHand,
            LegalAction::Discard(_) => ActionKind::Discard,
            LegalAction::SortHand { .. } => ActionKind::SortHand,
            LegalAction::ShopBuy { .. } => ActionKind::ShopBuy,
            LegalAction::ShopReroll => ActionKind::ShopReroll,
            LegalAction::ShopSellJoker { .. } => ActionKind::ShopSellJoker,
            LegalAction::ShopEnd => ActionKind::ShopEnd,
            LegalAction::SelectBlind { .. } => ActionKind::SelectBlind,
            LegalAction::SkipBlind => ActionKind::SkipBlind,
            LegalAction::SelectPackItem { .. } => ActionKind::SelectPackItem,
            LegalAction::SkipPack => ActionKind::SkipPack,
        }
    }
}

/// Phase-scoped set of permitted actions
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "wire::LegalActionsWire")]
pub struct LegalActionSet {
    pub schema_version: String,
    pub phase: GamePhase,
    pub actions: Vec<LegalAction>,
    pub error: Option<String>,
}

impl LegalActionSet {
    pub fn has_kind(&self, kind: ActionKind) -> bool {
        self.actions.iter().any(|action| action.kind() == kind)
    }

    pub fn of_kind(&self, kind: ActionKind) -> impl Iterator<Item = &LegalAction> {
        self.actions.iter().filter(move |action| action.kind() == kind)
    }
}

/// Loose wire form of an action: a kind tag plus a free-form params object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ActionRequest {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

/// Bridge answer to `POST action`
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ActionResult {
    pub ok: bool,
    pub error: Option<String>,
    pub state: Option<GameState>,
    pub legal: Option<LegalActionSet>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Health {
    pub status: String,
    pub version: String,
    pub uptime_ms: u64,
    pub request_count: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
}

/// Raw shapes of the legal-actions payload before they are closed into
/// [`LegalAction`] variants
mod wire {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct LegalActionsWire {
        pub schema_version: String,
        pub phase: GamePhase,
        #[serde(deserialize_with = "de::lenient_list")]
        pub actions: Vec<LegalActionWire>,
        pub error: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct LegalActionWire {
        #[serde(rename = "type")]
        pub kind: String,
        pub description: String,
        pub params: ParamsWire,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct ParamsWire {
        pub card_indices: Option<CardIndicesWire>,
        #[serde(deserialize_with = "de::opt_lenient_list")]
        pub mode: Option<Vec<String>>,
        #[serde(deserialize_with = "de::opt_lenient_num")]
        pub slot: Option<u8>,
        #[serde(deserialize_with = "de::opt_lenient_int")]
        pub cost: Option<i64>,
        #[serde(deserialize_with = "de::opt_lenient_num")]
        pub joker_index: Option<u8>,
        #[serde(deserialize_with = "de::opt_lenient_int")]
        pub sell_value: Option<i64>,
        #[serde(deserialize_with = "de::opt_lenient_list")]
        pub options: Option<Vec<String>>,
        #[serde(deserialize_with = "de::opt_lenient_num")]
        pub choice_index: Option<u8>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct CardIndicesWire {
        #[serde(deserialize_with = "de::opt_lenient_num_list")]
        pub available: Option<Vec<u8>>,
        #[serde(deserialize_with = "de::opt_lenient_num")]
        pub min_select: Option<usize>,
        #[serde(deserialize_with = "de::opt_lenient_num")]
        pub max_select: Option<usize>,
    }

    impl From<CardIndicesWire> for CardSelection {
        fn from(raw: CardIndicesWire) -> Self {
            let defaults = CardSelection::default();
            CardSelection {
                available: raw.available,
                min_select: raw.min_select.unwrap_or(defaults.min_select),
                max_select: raw.max_select.unwrap_or(defaults.max_select),
            }
        }
    }

    impl LegalActionWire {
        fn into_legal(self) -> Option<LegalAction> {
            let kind = match self.kind.parse::<ActionKind>() {
                Ok(kind) => kind,
                Err(_) => {
                    warn!(kind = %self.kind, description = %self.description, "dropping legal action of unknown kind");
                    return None;
                }
            };
            let params = self.params;
            let legal = match kind {
                ActionKind::PlayHand => LegalAction::PlayHand(params.card_indices.map(Into::into)),
                ActionKind::Discard => LegalAction::Discard(params.card_indices.map(Into::into)),
                ActionKind::SortHand => LegalAction::SortHand {
                    modes: params
                        .mode
                        .unwrap_or_default()
                        .iter()
                        .filter_map(|mode| SortMode::from_wire(mode))
                        .collect(),
                },
                ActionKind::ShopBuy => LegalAction::ShopBuy {
                    slot: params.slot,
                    cost: params.cost,
                },
                ActionKind::ShopReroll => LegalAction::ShopReroll,
                ActionKind::ShopSellJoker => LegalAction::ShopSellJoker {
                    joker_index: params.joker_index,
                    sell_value: params.sell_value,
                },
                ActionKind::ShopEnd => LegalAction::ShopEnd,
                ActionKind::SelectBlind => LegalAction::SelectBlind {
                    options: params
                        .options
                        .unwrap_or_default()
                        .iter()
                        .filter_map(|option| BlindOption::from_wire(option))
                        .collect(),
                },
                ActionKind::SkipBlind => LegalAction::SkipBlind,
                ActionKind::SelectPackItem => LegalAction::SelectPackItem {
                    choice_index: params.choice_index,
                },
                ActionKind::SkipPack => LegalAction::SkipPack,
            };
            Some(legal)
        }
    }

    impl From<LegalActionsWire> for LegalActionSet {
        fn from(raw: LegalActionsWire) -> Self {
            LegalActionSet {
                schema_version: raw.schema_version,
                phase: raw.phase,
                actions: raw
                    .actions
                    .into_iter()
                    .filter_map(LegalActionWire::into_legal)
                    .collect(),
                error: raw.error,
            }
        }
    }
}

/// Lenient field deserializers for the bridge's Lua-flavoured JSON
mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accepts `[...]`, `{}` / `{"1": .., "2": ..}` tables, or `null`
    pub fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(opt_lenient_list(deserializer)?.unwrap_or_default())
    }

    pub fn opt_lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ListOrTable<T> {
            List(Vec<T>),
            Table(std::collections::BTreeMap<String, T>),
        }

        let items = match Option::<ListOrTable<T>>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(ListOrTable::List(items)) => items,
            Some(ListOrTable::Table(table)) => sort_table(table.into_iter().collect()),
        };
        Ok(Some(items))
    }

    // Lua array-like tables keyed "1", "2", .., "10" must keep numeric order
    fn sort_table<T>(mut entries: Vec<(String, T)>) -> Vec<T> {
        entries.sort_by_key(|(key, _)| key.parse::<u64>().unwrap_or(u64::MAX));
        entries.into_iter().map(|(_, item)| item).collect()
    }

    pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(opt_lenient_string(deserializer)?.unwrap_or_default())
    }

    pub fn opt_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text),
            Some(other) => Some(other.to_string()),
        })
    }

    pub fn lenient_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(opt_lenient_int(deserializer)?.unwrap_or_default())
    }

    /// Integers, floats (truncated toward zero) and numeric strings
    pub fn opt_lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => Ok(number
                .as_i64()
                .or_else(|| number.as_f64().map(|value| value as i64))),
            Some(Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .map(|value| Some(value as i64))
                .map_err(|_| D::Error::custom(format!("expected a number, got {text:?}"))),
            Some(other) => Err(D::Error::custom(format!("expected a number, got {other}"))),
        }
    }

    /// Whole number of any width, read through [`opt_lenient_int`]
    struct LenientNum<T>(T);

    impl<'de, T: TryFrom<i64>> Deserialize<'de> for LenientNum<T> {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            narrow::<T, D::Error>(lenient_int(deserializer)?).map(LenientNum)
        }
    }

    fn narrow<T: TryFrom<i64>, E: serde::de::Error>(value: i64) -> Result<T, E> {
        T::try_from(value).map_err(|_| E::custom(format!("number {value} out of range")))
    }

    pub fn lenient_num<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<i64>,
    {
        LenientNum::deserialize(deserializer).map(|LenientNum(value)| value)
    }

    pub fn opt_lenient_num<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<i64>,
    {
        opt_lenient_int(deserializer)?
            .map(narrow::<T, D::Error>)
            .transpose()
    }

    pub fn opt_lenient_num_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<i64>,
    {
        let items: Option<Vec<LenientNum<T>>> = opt_lenient_list(deserializer)?;
        Ok(items.map(|items| items.into_iter().map(|LenientNum(value)| value).collect()))
    }
}
