//! Dystopian Exchange - Market Core
//!
//! Every citizen carries an **Index**, a non-negative "stock price" that moves
//! under three forces:
//!
//! 1. Drift - small automatic random moves applied to everyone
//! 2. Votes - players affirm or doubt each other, within daily quotas
//! 3. Tribunal - rare global shocks (uplift, crash, sanctions, halts)
//!
//! A citizen may buy a **Stability Protocol** window that halves its losses.
//!
//! # Core Rule
//!
//! Every mutation, whatever its source, goes through [`IndexMutator`]:
//!
//! ```text
//! new = max(0, round2(old × (1 + delta/100)))
//! delta < 0 && stability → delta × dampen_factor
//! ```
//!
//! This crate is pure and synchronous. Storage, scheduling and HTTP live in
//! `exchange-node`.

pub mod clock;
pub mod dice;
mod error;
mod index;
pub mod models;
pub mod schedule;
pub mod stability;
pub mod tribunal;
pub mod vote;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dice::{Dice, ScriptedDice, ThreadDice};
pub use error::{MarketError, MarketResult};
pub use index::{round2, IndexMutator, DEFAULT_DAMPEN_FACTOR};
pub use models::{
    generate_alias, Citizen, Event, EventKind, SystemState, User, Vote, VoteType,
    STARTING_INDEX,
};
pub use stability::{StabilityDuration, StabilityQuote};
pub use tribunal::TribunalKind;
