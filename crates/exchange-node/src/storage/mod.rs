//! Persistent store contract.
//!
//! The market never caches records across ticks. Every mutation goes through
//! one of the `update_*` primitives, which run the closure against the freshest
//! stored value and write the result back as one atomic row update. That is
//! the only consistency guarantee the engine relies on; there are no locks
//! above this layer.
//!
//! Two backends:
//! - [`Storage`] - RocksDB, the default for a running node
//! - [`MemoryStore`] - in-process tables, for tests and throwaway runs

#[cfg(test)]
pub(crate) mod contract;
#[cfg(test)]
pub(crate) mod flaky;
mod memory;
mod rocks;

pub use memory::MemoryStore;
pub use rocks::Storage;

use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use exchange_core::{Citizen, Event, SystemState, User, Vote, VoteType};
use std::sync::atomic::{AtomicU64, Ordering};

/// Storage backend for market records.
pub trait MarketStore: Send + Sync {
    // --- Citizens ---

    fn get_citizen(&self, id: &str) -> Result<Option<Citizen>>;

    fn list_citizens(&self) -> Result<Vec<Citizen>>;

    /// Citizens ordered by Index, highest first.
    fn top_citizens(&self, limit: usize) -> Result<Vec<Citizen>> {
        let mut citizens = self.list_citizens()?;
        citizens.sort_by(|a, b| b.index_value.total_cmp(&a.index_value));
        citizens.truncate(limit);
        Ok(citizens)
    }

    /// Atomic read-modify-write of one citizen.
    ///
    /// The closure sees the current stored value; returning `false` discards
    /// its changes. Yields `None` when the citizen does not exist, otherwise
    /// the value as it now stands.
    fn update_citizen(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut Citizen) -> bool,
    ) -> Result<Option<Citizen>>;

    /// Copy every citizen's Index into its midnight snapshot in one write.
    fn snapshot_midnight(&self, now: DateTime<Utc>) -> Result<usize>;

    // --- Users ---

    fn get_user(&self, id: &str) -> Result<Option<User>>;

    fn user_by_alias(&self, alias: &str) -> Result<Option<User>>;

    /// Atomic read-modify-write of one user, same contract as `update_citizen`.
    fn update_user(&self, id: &str, apply: &mut dyn FnMut(&mut User) -> bool)
        -> Result<Option<User>>;

    /// Write a new user and its citizen together. Fails with `InvalidInput`
    /// when the alias is taken.
    fn insert_registration(&self, user: &User, citizen: &Citizen) -> Result<()>;

    // --- Votes ---

    /// Store `vote` unless its actor already has `limit` votes of the same
    /// type on the same target that day. Counting and inserting happen as one
    /// step; returns whether the vote was stored.
    fn record_vote(&self, vote: &Vote, limit: usize) -> Result<bool>;

    /// Drop a stored vote. Missing votes are ignored.
    fn remove_vote(&self, vote: &Vote) -> Result<()>;

    /// Votes of one type from `actor_id` on `target_id` during `day`.
    fn count_votes(
        &self,
        actor_id: &str,
        target_id: &str,
        vote_type: VoteType,
        day: NaiveDate,
    ) -> Result<usize>;

    /// Most recent votes cast by `actor_id`, newest first.
    fn votes_by_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<Vote>>;

    // --- Events ---

    fn append_event(&self, event: &Event) -> Result<()>;

    /// Newest first.
    fn recent_events(&self, limit: usize) -> Result<Vec<Event>>;

    /// Events targeting one citizen, newest first.
    fn events_for_citizen(&self, citizen_id: &str, limit: usize) -> Result<Vec<Event>>;

    // --- System state ---

    /// The singleton, or its default when it has never been written.
    fn system_state(&self) -> Result<SystemState>;

    fn update_system_state(
        &self,
        apply: &mut dyn FnMut(&mut SystemState),
    ) -> Result<SystemState>;

    /// Create the singleton if absent.
    fn init_system_state(&self) -> Result<()> {
        self.update_system_state(&mut |_| {})?;
        Ok(())
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a record ID from a seed, the current time and a process counter.
pub fn generate_id(seed: &str) -> String {
    let n = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let hash = blake3::hash(format!("{seed}:{nanos}:{n}").as_bytes());
    hex::encode(&hash.as_bytes()[..16])
}
