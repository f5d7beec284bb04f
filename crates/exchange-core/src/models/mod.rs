//! Records the market reads and writes.
//!
//! # Core Types
//!
//! - [`Citizen`] - the tradable identity and its Index
//! - [`User`] - the player behind a citizen, holder of the vote quota
//! - [`Vote`] - one affirm/doubt, immutable once written
//! - [`Event`] - append-only audit entry
//! - [`SystemState`] - singleton holding the Market Halt Gate

mod citizen;
mod event;
mod system;
mod user;
mod vote;

pub use citizen::{Citizen, STARTING_INDEX};
pub use event::{Event, EventKind};
pub use system::SystemState;
pub use user::{generate_alias, User, ALIAS_PREFIXES};
pub use vote::{Vote, VoteType};
