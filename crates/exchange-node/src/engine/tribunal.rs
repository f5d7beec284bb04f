//! Tribunal shocks, scheduled and manual.

use super::Market;
use chrono::{DateTime, Utc};
use exchange_core::tribunal::SANCTION_TOP_N;
use exchange_core::{round2, Citizen, EventKind, MarketError, MarketResult, TribunalKind};
use serde::{Deserialize, Serialize};

/// Operator request to fire a tribunal event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TribunalRequest {
    pub event_type: Option<String>,
    /// Only meaningful for `global`: limits the move to one citizen
    pub target_id: Option<String>,
    /// Replaces the default summary message
    pub message: Option<String>,
    /// Overrides the drawn magnitude; the kind decides the sign
    pub delta_percent: Option<f64>,
}

/// What a tribunal tick did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TribunalOutcome {
    pub event_type: EventKind,
    /// True when a halt suppressed the event
    pub skipped: bool,
    /// Base delta before per-citizen dampening
    pub delta_percent: f64,
    /// Citizens whose Index moved
    pub affected: Vec<String>,
    /// Citizens whose update failed
    pub failed: usize,
    pub market_halt_until: Option<DateTime<Utc>>,
}

impl TribunalOutcome {
    fn skipped(event_type: EventKind) -> Self {
        Self {
            event_type,
            skipped: true,
            delta_percent: 0.0,
            affected: Vec::new(),
            failed: 0,
            market_halt_until: None,
        }
    }

    fn applied(event_type: EventKind, delta_percent: f64) -> Self {
        Self {
            skipped: false,
            ..Self::skipped(event_type)
        }
        .with_delta(delta_percent)
    }

    fn with_delta(mut self, delta_percent: f64) -> Self {
        self.delta_percent = delta_percent;
        self
    }
}

impl Market {
    /// One scheduled tick: draw a kind from the weight table and run it.
    pub fn tribunal_tick(&self) -> MarketResult<TribunalOutcome> {
        let kind = TribunalKind::draw(self.dice.as_ref());
        self.run_tribunal(kind, None, None)
    }

    /// Run one tribunal kind.
    ///
    /// Anything but an Observation Halt is skipped while the market is
    /// halted. `magnitude` replaces the random draw; its sign is ignored.
    pub fn run_tribunal(
        &self,
        kind: TribunalKind,
        magnitude: Option<f64>,
        message: Option<&str>,
    ) -> MarketResult<TribunalOutcome> {
        let now = self.now();
        if kind.is_market_impacting() && self.store.system_state()?.is_halted(now) {
            tracing::info!("Tribunal {} skipped: market halted", kind);
            return Ok(TribunalOutcome::skipped(kind.event_kind()));
        }

        let delta = match magnitude {
            Some(m) => kind.signed(round2(m.abs())),
            None => kind.draw_delta(self.dice.as_ref()),
        };

        let outcome = match kind {
            TribunalKind::ObservationHalt => self.observation_halt(now, message)?,
            TribunalKind::SectorUplift | TribunalKind::SectorCrash => {
                let default = format!("{} enacted ({:+.2}%).", kind.display_name(), delta);
                self.move_everyone(kind.event_kind(), delta, None, now, message, default)?
            }
            TribunalKind::SanctionWave => self.sanction_wave(delta, now, message)?,
        };

        tracing::info!(
            "Tribunal {}: delta {:+.2}%, {} affected, {} failed",
            kind,
            outcome.delta_percent,
            outcome.affected.len(),
            outcome.failed
        );
        Ok(outcome)
    }

    /// Operator trigger for any tribunal kind, or a custom `global` move.
    pub fn trigger_tribunal(&self, req: &TribunalRequest) -> MarketResult<TribunalOutcome> {
        let event_type = req
            .event_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MarketError::invalid("eventType is required"))?;
        if req.delta_percent.is_some_and(|d| !d.is_finite()) {
            return Err(MarketError::invalid("deltaPercent must be a finite number"));
        }
        let message = req.message.as_deref().map(str::trim).filter(|m| !m.is_empty());

        if event_type == EventKind::Global.as_str() {
            return self.global_event(req.target_id.as_deref(), req.delta_percent, message);
        }

        let kind: TribunalKind = event_type.parse()?;
        tracing::info!("Manual tribunal trigger: {}", kind);
        self.run_tribunal(kind, req.delta_percent, message)
    }

    fn observation_halt(
        &self,
        now: DateTime<Utc>,
        message: Option<&str>,
    ) -> MarketResult<TribunalOutcome> {
        let state = self
            .store
            .update_system_state(&mut |s| s.halt_for(now, TribunalKind::halt_length()))?;

        let event = self
            .event(
                EventKind::ObservationHalt,
                message.unwrap_or("Observation Halt enacted. Market frozen."),
                now,
            )
            .with_delta(0.0);
        self.store.append_event(&event)?;

        let mut outcome = TribunalOutcome::applied(EventKind::ObservationHalt, 0.0);
        outcome.market_halt_until = state.market_halt_until;
        Ok(outcome)
    }

    /// Apply `delta` to every citizen, or to `only` when given, and log one
    /// untargeted event carrying the undampened delta.
    fn move_everyone(
        &self,
        kind: EventKind,
        delta: f64,
        only: Option<&Citizen>,
        now: DateTime<Utc>,
        message: Option<&str>,
        default_message: String,
    ) -> MarketResult<TribunalOutcome> {
        let citizens = match only {
            Some(c) => vec![c.clone()],
            None => self.store.list_citizens()?,
        };

        let mut outcome = TribunalOutcome::applied(kind, delta);
        for citizen in &citizens {
            match self.move_citizen(&citizen.id, delta, now) {
                Ok(Some(_)) => outcome.affected.push(citizen.id.clone()),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("{} failed for {}: {}", kind, citizen.id, e);
                    outcome.failed += 1;
                }
            }
        }

        let mut event = self
            .event(kind, message.map(str::to_string).unwrap_or(default_message), now)
            .with_delta(delta);
        if let Some(c) = only {
            event = event.with_target(c.id.clone());
        }
        self.store.append_event(&event)?;
        self.mark_tribunal(now)?;
        Ok(outcome)
    }

    fn sanction_wave(
        &self,
        delta: f64,
        now: DateTime<Utc>,
        message: Option<&str>,
    ) -> MarketResult<TribunalOutcome> {
        let top = self.store.top_citizens(SANCTION_TOP_N)?;

        let mut outcome = TribunalOutcome::applied(EventKind::SanctionWave, delta);
        for citizen in &top {
            match self.move_citizen(&citizen.id, delta, now) {
                Ok(Some((_, applied))) => {
                    let applied = round2(applied);
                    let event = self
                        .event(
                            EventKind::Sanction,
                            format!("Citizen sanctioned ({applied:.2}%)."),
                            now,
                        )
                        .with_target(citizen.id.clone())
                        .with_delta(applied);
                    if let Err(e) = self.store.append_event(&event) {
                        tracing::warn!("Sanction event for {} not written: {}", citizen.id, e);
                    }
                    outcome.affected.push(citizen.id.clone());
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Sanction failed for {}: {}", citizen.id, e);
                    outcome.failed += 1;
                }
            }
        }

        let summary = match message {
            Some(m) => m.to_string(),
            None => format!(
                "Sanction Wave applied to top {} citizens ({:.2}%).",
                SANCTION_TOP_N, delta
            ),
        };
        let event = self
            .event(EventKind::SanctionWave, summary, now)
            .with_delta(delta);
        self.store.append_event(&event)?;
        self.mark_tribunal(now)?;
        Ok(outcome)
    }

    /// Operator-defined market move. Needs both a delta and a message, and is
    /// refused outright during a halt.
    fn global_event(
        &self,
        target_id: Option<&str>,
        delta: Option<f64>,
        message: Option<&str>,
    ) -> MarketResult<TribunalOutcome> {
        let delta = delta
            .filter(|d| *d != 0.0)
            .ok_or_else(|| MarketError::invalid("global events need a non-zero deltaPercent"))?;
        let message =
            message.ok_or_else(|| MarketError::invalid("global events need a message"))?;

        let now = self.now();
        self.ensure_open(now)?;

        let only = match target_id.map(str::trim).filter(|t| !t.is_empty()) {
            Some(id) => Some(self.load_citizen(id)?),
            None => None,
        };

        tracing::info!("Manual global event: {:+.2}%", delta);
        let outcome = self.move_everyone(
            EventKind::Global,
            delta,
            only.as_ref(),
            now,
            Some(message),
            String::new(),
        )?;
        Ok(outcome)
    }

    fn mark_tribunal(&self, now: DateTime<Utc>) -> MarketResult<()> {
        self.store
            .update_system_state(&mut |s| s.last_tribunal_at = Some(now))?;
        Ok(())
    }
}
