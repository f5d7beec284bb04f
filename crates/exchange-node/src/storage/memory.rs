//! In-process store. Nothing survives a restart.

use super::MarketStore;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use exchange_core::{Citizen, Event, MarketError, SystemState, User, Vote, VoteType};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    citizens: HashMap<String, Citizen>,
    users: HashMap<String, User>,
    aliases: HashMap<String, String>,
    votes: Vec<Vote>,
    events: Vec<Event>,
    system: Option<SystemState>,
}

impl Tables {
    fn count_votes(
        &self,
        actor_id: &str,
        target_id: &str,
        vote_type: VoteType,
        day: NaiveDate,
    ) -> usize {
        self.votes
            .iter()
            .filter(|v| {
                v.actor_id == actor_id
                    && v.target_citizen_id == target_id
                    && v.vote_type == vote_type
                    && v.created_utc_date == day
            })
            .count()
    }
}

/// Market store held in memory behind one table lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| Error::Storage("memory tables poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| Error::Storage("memory tables poisoned".into()))
    }
}

impl MarketStore for MemoryStore {
    fn get_citizen(&self, id: &str) -> Result<Option<Citizen>> {
        Ok(self.read()?.citizens.get(id).cloned())
    }

    fn list_citizens(&self) -> Result<Vec<Citizen>> {
        let mut citizens: Vec<Citizen> = self.read()?.citizens.values().cloned().collect();
        citizens.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(citizens)
    }

    fn update_citizen(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut Citizen) -> bool,
    ) -> Result<Option<Citizen>> {
        let mut tables = self.write()?;
        let Some(stored) = tables.citizens.get_mut(id) else {
            return Ok(None);
        };
        let mut draft = stored.clone();
        if apply(&mut draft) {
            *stored = draft;
        }
        Ok(Some(stored.clone()))
    }

    fn snapshot_midnight(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.write()?;
        for citizen in tables.citizens.values_mut() {
            citizen.index_value_at_midnight_utc = citizen.index_value;
            citizen.last_updated = now;
        }
        Ok(tables.citizens.len())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    fn user_by_alias(&self, alias: &str) -> Result<Option<User>> {
        let tables = self.read()?;
        Ok(tables
            .aliases
            .get(&alias.to_lowercase())
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    fn update_user(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut User) -> bool,
    ) -> Result<Option<User>> {
        let mut tables = self.write()?;
        let Some(stored) = tables.users.get_mut(id) else {
            return Ok(None);
        };
        let mut draft = stored.clone();
        if apply(&mut draft) {
            *stored = draft;
        }
        Ok(Some(stored.clone()))
    }

    fn insert_registration(&self, user: &User, citizen: &Citizen) -> Result<()> {
        let mut tables = self.write()?;
        let alias = user.alias.to_lowercase();
        if tables.aliases.contains_key(&alias) {
            return Err(MarketError::invalid(format!("alias '{}' is taken", user.alias)).into());
        }
        tables.aliases.insert(alias, user.id.clone());
        tables.users.insert(user.id.clone(), user.clone());
        tables.citizens.insert(citizen.id.clone(), citizen.clone());
        Ok(())
    }

    fn record_vote(&self, vote: &Vote, limit: usize) -> Result<bool> {
        let mut tables = self.write()?;
        let cast = tables.count_votes(
            &vote.actor_id,
            &vote.target_citizen_id,
            vote.vote_type,
            vote.created_utc_date,
        );
        if cast >= limit {
            return Ok(false);
        }
        tables.votes.push(vote.clone());
        Ok(true)
    }

    fn remove_vote(&self, vote: &Vote) -> Result<()> {
        self.write()?.votes.retain(|v| v.id != vote.id);
        Ok(())
    }

    fn count_votes(
        &self,
        actor_id: &str,
        target_id: &str,
        vote_type: VoteType,
        day: NaiveDate,
    ) -> Result<usize> {
        Ok(self.read()?.count_votes(actor_id, target_id, vote_type, day))
    }

    fn votes_by_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<Vote>> {
        let mut votes: Vec<Vote> = self
            .read()?
            .votes
            .iter()
            .filter(|v| v.actor_id == actor_id)
            .cloned()
            .collect();
        votes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        votes.truncate(limit);
        Ok(votes)
    }

    fn append_event(&self, event: &Event) -> Result<()> {
        self.write()?.events.push(event.clone());
        Ok(())
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        Ok(self.read()?.events.iter().rev().take(limit).cloned().collect())
    }

    fn events_for_citizen(&self, citizen_id: &str, limit: usize) -> Result<Vec<Event>> {
        Ok(self
            .read()?
            .events
            .iter()
            .rev()
            .filter(|e| e.target_id.as_deref() == Some(citizen_id))
            .take(limit)
            .cloned()
            .collect())
    }

    fn system_state(&self) -> Result<SystemState> {
        Ok(self.read()?.system.clone().unwrap_or_default())
    }

    fn update_system_state(
        &self,
        apply: &mut dyn FnMut(&mut SystemState),
    ) -> Result<SystemState> {
        let mut tables = self.write()?;
        let state = tables.system.get_or_insert_with(SystemState::default);
        apply(state);
        Ok(state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::contract;

    #[test]
    fn memory_store_contract() {
        contract::exercise(&MemoryStore::new());
    }
}
