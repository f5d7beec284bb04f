//! Memory store with switchable faults, for exercising failure paths.

use super::{MarketStore, MemoryStore};
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use exchange_core::{Citizen, Event, SystemState, User, Vote, VoteType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    broken_citizen: Mutex<Option<String>>,
    system_read_failures: AtomicUsize,
    user_read_gate: Mutex<Option<Arc<Barrier>>>,
}

fn injected(what: &str) -> Error {
    Error::Storage(format!("injected failure: {what}"))
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every update of this citizen fails until cleared.
    pub fn break_citizen(&self, id: Option<&str>) {
        *self.broken_citizen.lock().unwrap() = id.map(str::to_string);
    }

    /// Fail the next `n` system state reads.
    pub fn fail_system_reads(&self, n: usize) {
        self.system_read_failures.store(n, Ordering::SeqCst);
    }

    /// Hold `get_user` callers at `gate` until enough of them arrive.
    pub fn gate_user_reads(&self, gate: Option<Arc<Barrier>>) {
        *self.user_read_gate.lock().unwrap() = gate;
    }
}

impl MarketStore for FlakyStore {
    fn get_citizen(&self, id: &str) -> Result<Option<Citizen>> {
        self.inner.get_citizen(id)
    }

    fn list_citizens(&self) -> Result<Vec<Citizen>> {
        self.inner.list_citizens()
    }

    fn update_citizen(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut Citizen) -> bool,
    ) -> Result<Option<Citizen>> {
        if self.broken_citizen.lock().unwrap().as_deref() == Some(id) {
            return Err(injected(id));
        }
        self.inner.update_citizen(id, apply)
    }

    fn snapshot_midnight(&self, now: DateTime<Utc>) -> Result<usize> {
        self.inner.snapshot_midnight(now)
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let gate = self.user_read_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait();
        }
        self.inner.get_user(id)
    }

    fn user_by_alias(&self, alias: &str) -> Result<Option<User>> {
        self.inner.user_by_alias(alias)
    }

    fn update_user(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut User) -> bool,
    ) -> Result<Option<User>> {
        self.inner.update_user(id, apply)
    }

    fn insert_registration(&self, user: &User, citizen: &Citizen) -> Result<()> {
        self.inner.insert_registration(user, citizen)
    }

    fn record_vote(&self, vote: &Vote, limit: usize) -> Result<bool> {
        self.inner.record_vote(vote, limit)
    }

    fn remove_vote(&self, vote: &Vote) -> Result<()> {
        self.inner.remove_vote(vote)
    }

    fn count_votes(
        &self,
        actor_id: &str,
        target_id: &str,
        vote_type: VoteType,
        day: NaiveDate,
    ) -> Result<usize> {
        self.inner.count_votes(actor_id, target_id, vote_type, day)
    }

    fn votes_by_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<Vote>> {
        self.inner.votes_by_actor(actor_id, limit)
    }

    fn append_event(&self, event: &Event) -> Result<()> {
        self.inner.append_event(event)
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        self.inner.recent_events(limit)
    }

    fn events_for_citizen(&self, citizen_id: &str, limit: usize) -> Result<Vec<Event>> {
        self.inner.events_for_citizen(citizen_id, limit)
    }

    fn system_state(&self) -> Result<SystemState> {
        let pending = self
            .system_read_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(injected("system state"));
        }
        self.inner.system_state()
    }

    fn update_system_state(
        &self,
        apply: &mut dyn FnMut(&mut SystemState),
    ) -> Result<SystemState> {
        self.inner.update_system_state(apply)
    }
}
