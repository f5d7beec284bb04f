//! Persistent storage using RocksDB.

use super::MarketStore;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use exchange_core::{Citizen, Event, MarketError, SystemState, User, Vote, VoteType};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// RocksDB-backed market storage.
///
/// Values are JSON under prefixed keys. Read-modify-write primitives hold
/// `write_guard` across the get and the put so they behave as row updates.
pub struct Storage {
    db: DB,
    write_guard: Mutex<()>,
    event_seq: AtomicU64,
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self {
            db,
            write_guard: Mutex::new(()),
            event_seq: AtomicU64::new(0),
        })
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_guard
            .lock()
            .map_err(|_| Error::Storage("write guard poisoned".into()))
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_vec(value)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    /// Every value whose key starts with `prefix`, in key order.
    fn scan_prefix<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let prefix = prefix.as_bytes();
        let mut values = Vec::new();

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix) {
                values.push(serde_json::from_slice(&value)?);
            } else {
                break;
            }
        }

        Ok(values)
    }

    /// Walk events newest first, keeping those `keep` accepts, up to `limit`.
    fn scan_events_rev(&self, limit: usize, keep: impl Fn(&Event) -> bool) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        if limit == 0 {
            return Ok(events);
        }

        // ';' sorts right after ':', so this seeks to the last event key.
        let iter = self
            .db
            .iterator(IteratorMode::From(b"event;", Direction::Reverse));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(b"event:") {
                break;
            }
            let event: Event = serde_json::from_slice(&value)?;
            if keep(&event) {
                events.push(event);
                if events.len() >= limit {
                    break;
                }
            }
        }

        Ok(events)
    }

    fn citizen_key(id: &str) -> String {
        format!("citizen:{}", id)
    }

    fn user_key(id: &str) -> String {
        format!("user:{}", id)
    }

    fn alias_key(alias: &str) -> String {
        format!("alias:{}", alias.to_lowercase())
    }

    fn vote_prefix(actor_id: &str, target_id: &str, day: NaiveDate, vote_type: VoteType) -> String {
        format!("vote:{}:{}:{}:{}:", actor_id, target_id, day, vote_type)
    }

    fn vote_key(vote: &Vote) -> String {
        let prefix = Self::vote_prefix(
            &vote.actor_id,
            &vote.target_citizen_id,
            vote.created_utc_date,
            vote.vote_type,
        );
        format!("{}{}", prefix, vote.id)
    }
}

impl MarketStore for Storage {
    // --- Citizens ---

    fn get_citizen(&self, id: &str) -> Result<Option<Citizen>> {
        self.get_json(&Self::citizen_key(id))
    }

    fn list_citizens(&self) -> Result<Vec<Citizen>> {
        self.scan_prefix("citizen:")
    }

    fn update_citizen(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut Citizen) -> bool,
    ) -> Result<Option<Citizen>> {
        let _guard = self.guard()?;
        let key = Self::citizen_key(id);
        let Some(mut citizen) = self.get_json::<Citizen>(&key)? else {
            return Ok(None);
        };
        let before = citizen.clone();
        if apply(&mut citizen) {
            self.put_json(&key, &citizen)?;
            Ok(Some(citizen))
        } else {
            Ok(Some(before))
        }
    }

    fn snapshot_midnight(&self, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.guard()?;
        let citizens: Vec<Citizen> = self.scan_prefix("citizen:")?;
        let mut batch = WriteBatch::default();
        for mut citizen in citizens.iter().cloned() {
            citizen.index_value_at_midnight_utc = citizen.index_value;
            citizen.last_updated = now;
            batch.put(Self::citizen_key(&citizen.id).as_bytes(), serde_json::to_vec(&citizen)?);
        }
        self.db.write(batch)?;
        Ok(citizens.len())
    }

    // --- Users ---

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.get_json(&Self::user_key(id))
    }

    fn user_by_alias(&self, alias: &str) -> Result<Option<User>> {
        match self.db.get(Self::alias_key(alias).as_bytes())? {
            Some(id) => self.get_user(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    fn update_user(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut User) -> bool,
    ) -> Result<Option<User>> {
        let _guard = self.guard()?;
        let key = Self::user_key(id);
        let Some(mut user) = self.get_json::<User>(&key)? else {
            return Ok(None);
        };
        let before = user.clone();
        if apply(&mut user) {
            self.put_json(&key, &user)?;
            Ok(Some(user))
        } else {
            Ok(Some(before))
        }
    }

    fn insert_registration(&self, user: &User, citizen: &Citizen) -> Result<()> {
        let _guard = self.guard()?;
        let alias_key = Self::alias_key(&user.alias);
        if self.db.get(alias_key.as_bytes())?.is_some() {
            return Err(MarketError::invalid(format!("alias '{}' is taken", user.alias)).into());
        }

        let mut batch = WriteBatch::default();
        batch.put(alias_key.as_bytes(), user.id.as_bytes());
        batch.put(Self::user_key(&user.id).as_bytes(), serde_json::to_vec(user)?);
        batch.put(Self::citizen_key(&citizen.id).as_bytes(), serde_json::to_vec(citizen)?);
        self.db.write(batch)?;
        Ok(())
    }

    // --- Votes ---

    fn record_vote(&self, vote: &Vote, limit: usize) -> Result<bool> {
        let _guard = self.guard()?;
        let prefix = Self::vote_prefix(
            &vote.actor_id,
            &vote.target_citizen_id,
            vote.created_utc_date,
            vote.vote_type,
        );
        if self.scan_prefix::<Vote>(&prefix)?.len() >= limit {
            return Ok(false);
        }
        self.put_json(&Self::vote_key(vote), vote)?;
        Ok(true)
    }

    fn remove_vote(&self, vote: &Vote) -> Result<()> {
        let _guard = self.guard()?;
        self.db.delete(Self::vote_key(vote).as_bytes())?;
        Ok(())
    }

    fn count_votes(
        &self,
        actor_id: &str,
        target_id: &str,
        vote_type: VoteType,
        day: NaiveDate,
    ) -> Result<usize> {
        let prefix = Self::vote_prefix(actor_id, target_id, day, vote_type);
        Ok(self.scan_prefix::<Vote>(&prefix)?.len())
    }

    fn votes_by_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<Vote>> {
        let mut votes: Vec<Vote> = self.scan_prefix(&format!("vote:{}:", actor_id))?;
        votes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        votes.truncate(limit);
        Ok(votes)
    }

    // --- Events ---

    fn append_event(&self, event: &Event) -> Result<()> {
        let micros = event.created_at.timestamp_micros().max(0);
        let seq = self.event_seq.fetch_add(1, Ordering::Relaxed);
        let key = format!("event:{:020}:{:010}:{}", micros, seq, event.id);
        self.put_json(&key, event)
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        self.scan_events_rev(limit, |_| true)
    }

    fn events_for_citizen(&self, citizen_id: &str, limit: usize) -> Result<Vec<Event>> {
        self.scan_events_rev(limit, |e| e.target_id.as_deref() == Some(citizen_id))
    }

    // --- System state ---

    fn system_state(&self) -> Result<SystemState> {
        Ok(self.get_json(SystemState::KEY)?.unwrap_or_default())
    }

    fn update_system_state(
        &self,
        apply: &mut dyn FnMut(&mut SystemState),
    ) -> Result<SystemState> {
        let _guard = self.guard()?;
        let mut state: SystemState = self.get_json(SystemState::KEY)?.unwrap_or_default();
        apply(&mut state);
        self.put_json(SystemState::KEY, &state)?;
        Ok(state)
    }
}
