//! Market engine.
//!
//! [`Market`] is the one place market operations live. HTTP handlers, the
//! admin socket and the background schedulers all call into it; none of them
//! touch the store directly.
//!
//! The engine holds no market state of its own. Every operation reads the
//! store, decides, and writes back through the store's atomic row updates.
//! Time and randomness come in through [`Clock`] and [`Dice`] so tests can pin
//! both.

mod drift;
mod snapshot;
mod stability;
mod tribunal;
mod vote;

pub use drift::DriftReport;
pub use stability::{StabilityOffer, StabilityReceipt};
pub use tribunal::{TribunalOutcome, TribunalRequest};
pub use vote::{VoteHistoryEntry, VoteReceipt, VoteRequest, DEFAULT_HISTORY_LIMIT};

use crate::storage::{generate_id, MarketStore};
use chrono::{DateTime, Utc};
use exchange_core::{
    generate_alias, Citizen, Clock, Dice, Event, EventKind, IndexMutator, MarketError,
    MarketResult, SystemClock, SystemState, ThreadDice, User,
};
use serde::Serialize;
use std::sync::Arc;

/// Longest alias a player may pick.
pub const MAX_ALIAS_LEN: usize = 32;

/// Attempts at drawing a free alias before giving up.
const ALIAS_ATTEMPTS: usize = 8;

/// Default page size of the global event feed.
pub const DEFAULT_EVENT_LIMIT: usize = 50;

/// Default page size of a citizen's event feed.
pub const DEFAULT_CITIZEN_EVENT_LIMIT: usize = 20;

/// The market engine.
pub struct Market {
    store: Arc<dyn MarketStore>,
    clock: Arc<dyn Clock>,
    dice: Arc<dyn Dice>,
    mutator: IndexMutator,
}

/// Result of registering a player.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub user_id: String,
    pub citizen_id: String,
    pub alias: String,
}

/// A citizen as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitizenView {
    #[serde(flatten)]
    pub citizen: Citizen,
    /// Movement since the last midnight snapshot, in percent
    pub percent_change_today: Option<f64>,
    /// Whether losses are currently dampened
    pub stability_in_effect: bool,
}

/// Result of an operator Index adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexAdjustment {
    pub new_index: f64,
    pub delta_percent: f64,
}

impl Market {
    pub fn new(
        store: Arc<dyn MarketStore>,
        clock: Arc<dyn Clock>,
        dice: Arc<dyn Dice>,
        mutator: IndexMutator,
    ) -> Self {
        Self {
            store,
            clock,
            dice,
            mutator,
        }
    }

    /// Engine on the real clock and thread RNG.
    pub fn live(store: Arc<dyn MarketStore>, mutator: IndexMutator) -> Self {
        Self::new(store, Arc::new(SystemClock), Arc::new(ThreadDice), mutator)
    }

    pub fn dice(&self) -> &dyn Dice {
        self.dice.as_ref()
    }

    pub fn mutator(&self) -> IndexMutator {
        self.mutator
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // --- Halt gate ---

    pub fn is_halted(&self) -> MarketResult<bool> {
        let now = self.now();
        Ok(self.store.system_state()?.is_halted(now))
    }

    /// Refuse market-impacting work while an Observation Halt is running.
    fn ensure_open(&self, now: DateTime<Utc>) -> MarketResult<()> {
        if self.store.system_state()?.is_halted(now) {
            return Err(MarketError::MarketHalted);
        }
        Ok(())
    }

    pub fn tribunal_state(&self) -> MarketResult<SystemState> {
        Ok(self.store.system_state()?)
    }

    // --- Players ---

    /// Create a user and its citizen. A missing alias is generated.
    pub fn register_citizen(&self, alias: Option<&str>) -> MarketResult<Registration> {
        let now = self.now();

        let chosen = match alias.map(str::trim) {
            Some("") => return Err(MarketError::invalid("alias must not be empty")),
            Some(a) if a.chars().count() > MAX_ALIAS_LEN => {
                return Err(MarketError::invalid(format!(
                    "alias longer than {MAX_ALIAS_LEN} characters"
                )))
            }
            Some(a) => Some(a.to_string()),
            None => None,
        };

        let attempts = if chosen.is_some() { 1 } else { ALIAS_ATTEMPTS };
        let mut last_err = MarketError::invalid("no free alias");
        for _ in 0..attempts {
            let alias = chosen
                .clone()
                .unwrap_or_else(|| generate_alias(self.dice.as_ref()));
            let user = User::new(generate_id(&alias), alias.clone(), now);
            let citizen = Citizen::new(generate_id(&user.id), user.id.clone(), alias.clone(), now);

            match self.store.insert_registration(&user, &citizen) {
                Ok(()) => {
                    tracing::info!("Registered {} as citizen {}", alias, citizen.id);
                    return Ok(Registration {
                        user_id: user.id,
                        citizen_id: citizen.id,
                        alias,
                    });
                }
                Err(e) => match MarketError::from(e) {
                    taken @ MarketError::InvalidInput(_) => last_err = taken,
                    other => return Err(other),
                },
            }
        }
        Err(last_err)
    }

    pub fn citizen(&self, citizen_id: &str) -> MarketResult<CitizenView> {
        let now = self.now();
        let citizen = self.load_citizen(citizen_id)?;
        Ok(CitizenView {
            percent_change_today: citizen.percent_change_today(),
            stability_in_effect: citizen.stability_in_effect(now),
            citizen,
        })
    }

    /// Operator override: move one Index by `delta_percent`, undampened.
    pub fn adjust_index(
        &self,
        citizen_id: &str,
        delta_percent: f64,
        reason: &str,
    ) -> MarketResult<IndexAdjustment> {
        if !delta_percent.is_finite() || delta_percent == 0.0 {
            return Err(MarketError::invalid("deltaPercent must be a non-zero number"));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(MarketError::invalid("reason is required"));
        }

        let now = self.now();
        let updated = self
            .store
            .update_citizen(citizen_id, &mut |c| {
                let next = self.mutator.apply(c.index_value, delta_percent, false);
                c.set_index(next, now);
                true
            })?
            .ok_or_else(|| MarketError::not_found(format!("citizen {citizen_id}")))?;

        let event = self
            .event(
                EventKind::IndexChange,
                format!("Index adjusted by {delta_percent:+.2}%: {reason}"),
                now,
            )
            .with_target(citizen_id)
            .with_delta(delta_percent);
        self.store.append_event(&event)?;

        tracing::info!(
            "Adjusted {} by {:+.2}% to {:.2}",
            citizen_id,
            delta_percent,
            updated.index_value
        );
        Ok(IndexAdjustment {
            new_index: updated.index_value,
            delta_percent,
        })
    }

    // --- Events ---

    pub fn recent_events(&self, limit: usize) -> MarketResult<Vec<Event>> {
        Ok(self.store.recent_events(limit)?)
    }

    pub fn citizen_events(&self, citizen_id: &str, limit: usize) -> MarketResult<Vec<Event>> {
        self.load_citizen(citizen_id)?;
        Ok(self.store.events_for_citizen(citizen_id, limit)?)
    }

    // --- Helpers shared by the operation modules ---

    fn load_citizen(&self, citizen_id: &str) -> MarketResult<Citizen> {
        self.store
            .get_citizen(citizen_id)?
            .ok_or_else(|| MarketError::not_found(format!("citizen {citizen_id}")))
    }

    fn event(&self, kind: EventKind, message: impl Into<String>, now: DateTime<Utc>) -> Event {
        Event::new(generate_id(kind.as_str()), kind, message, now)
    }

    /// Move one citizen by `base_delta` under its own stability state.
    ///
    /// Returns the updated citizen and the delta actually applied, or `None`
    /// when the citizen vanished.
    fn move_citizen(
        &self,
        citizen_id: &str,
        base_delta: f64,
        now: DateTime<Utc>,
    ) -> MarketResult<Option<(Citizen, f64)>> {
        let mut applied = base_delta;
        let updated = self.store.update_citizen(citizen_id, &mut |c| {
            let stability = c.stability_in_effect(now);
            applied = self.mutator.effective_delta(base_delta, stability);
            let next = self.mutator.apply(c.index_value, base_delta, stability);
            c.set_index(next, now);
            true
        })?;
        Ok(updated.map(|c| (c, applied)))
    }
}


#[cfg(test)]
mod tests {
    use super::testkit::*;
    use super::*;
    use exchange_core::ScriptedDice;

    #[test]
    fn register_with_and_without_alias() {
        let h = Harness::new(ScriptedDice::new([0.0, 0.0]));
        let chosen = h.market.register_citizen(Some("  Asset-0042 ")).unwrap();
        assert_eq!(chosen.alias, "Asset-0042");

        let generated = h.market.register_citizen(None).unwrap();
        assert_eq!(generated.alias, "Citizen-0001");

        let citizen = h.store.get_citizen(&generated.citizen_id).unwrap().unwrap();
        assert_eq!(citizen.owner_id, generated.user_id);
        assert_eq!(citizen.index_value, 100.0);
        assert_eq!(citizen.index_value_at_midnight_utc, 100.0);
        let user = h.store.get_user(&generated.user_id).unwrap().unwrap();
        assert_eq!(user.daily_quota_remaining, 20);
        assert_eq!(user.quota_reset_date, start().date_naive());
    }

    #[test]
    fn duplicate_alias_rejected() {
        let h = Harness::new(ScriptedDice::constant(0.0));
        h.market.register_citizen(Some("Unit-0007")).unwrap();
        assert!(matches!(
            h.market.register_citizen(Some("unit-0007")),
            Err(MarketError::InvalidInput(_))
        ));
        assert!(matches!(
            h.market.register_citizen(Some("   ")),
            Err(MarketError::InvalidInput(_))
        ));
    }

    #[test]
    fn generated_alias_retries_on_collision() {
        // The first two draws land on the taken alias.
        let h = Harness::new(ScriptedDice::new([0.0, 0.0, 0.0, 0.0, 0.2, 0.0]));
        h.market.register_citizen(Some("Citizen-0001")).unwrap();
        let reg = h.market.register_citizen(None).unwrap();
        assert_eq!(reg.alias, "Subject-0001");
    }

    #[test]
    fn adjust_index_ignores_stability() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        let a = h.player("Unit-0001");
        h.store
            .update_citizen(&a.citizen_id, &mut |c| {
                c.stability_active = true;
                c.stability_expires_at = Some(start() + chrono::Duration::hours(1));
                true
            })
            .unwrap();

        let adj = h.market.adjust_index(&a.citizen_id, -10.0, "audit").unwrap();
        assert_eq!(adj.new_index, 90.0);

        let events = h.market.citizen_events(&a.citizen_id, 20).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::IndexChange);
        assert_eq!(events[0].delta_percent, Some(-10.0));
    }

    #[test]
    fn adjust_index_validation() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        let a = h.player("Unit-0001");
        assert!(matches!(
            h.market.adjust_index(&a.citizen_id, 0.0, "noop"),
            Err(MarketError::InvalidInput(_))
        ));
        assert!(matches!(
            h.market.adjust_index(&a.citizen_id, 1.0, " "),
            Err(MarketError::InvalidInput(_))
        ));
        assert!(matches!(
            h.market.adjust_index("ghost", 1.0, "why"),
            Err(MarketError::NotFound(_))
        ));
    }

    #[test]
    fn citizen_view_reports_daily_change() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        let a = h.player("Entity-0100");
        h.set_index(&a.citizen_id, 95.0);
        let view = h.market.citizen(&a.citizen_id).unwrap();
        assert_eq!(view.percent_change_today, Some(-5.0));
        assert!(!view.stability_in_effect);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["indexValue"], 95.0);
        assert_eq!(json["percentChangeToday"], -5.0);
    }

    #[test]
    fn halt_gate_reads_expiry() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        assert!(!h.market.is_halted().unwrap());
        h.halt();
        assert!(h.market.is_halted().unwrap());
        h.clock.advance(chrono::Duration::minutes(2));
        assert!(!h.market.is_halted().unwrap());
        assert!(h.market.tribunal_state().unwrap().last_tribunal_at.is_some());
    }
}
