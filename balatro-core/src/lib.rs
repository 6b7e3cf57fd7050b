//! Core types for the Balatro reinforcement-learning environment
//!
//! This crate is pure and synchronous; it performs no I/O:
//! - `schema`: typed data model for bridge payloads
//! - `action`: action codec between structured actions and dense indices, plus the legality mask
//! - `featurizer`: fixed-length observation encoding of a game snapshot
//! - `spaces`: action/observation space descriptors

pub mod action;
pub mod featurizer;
pub mod schema;
pub mod spaces;

// Re-export main types for convenience
pub use action::{
    ActionCodec, ActionKind, BlindOption, CardPositions, CodecConfig, CodecError, SortMode,
    StructuredAction, ACTION_SPACE_SIZE,
};
pub use featurizer::{StateFeaturizer, OBSERVATION_DIM};
pub use schema::{
    ActionRequest, ActionResult, GamePhase, GameState, Health, LegalAction, LegalActionSet,
};
pub use spaces::Capabilities;
