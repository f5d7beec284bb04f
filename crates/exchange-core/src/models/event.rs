//! Event log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Vote,
    StabilityActivated,
    SectorUplift,
    SectorCrash,
    ObservationHalt,
    SanctionWave,
    Sanction,
    MidnightSnapshot,
    IndexChange,
    Global,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vote => "vote",
            Self::StabilityActivated => "stability_activated",
            Self::SectorUplift => "sector_uplift",
            Self::SectorCrash => "sector_crash",
            Self::ObservationHalt => "observation_halt",
            Self::SanctionWave => "sanction_wave",
            Self::Sanction => "sanction",
            Self::MidnightSnapshot => "midnight_snapshot",
            Self::IndexChange => "index_change",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,

    #[serde(rename = "eventType")]
    pub kind: EventKind,

    /// Citizen the event concerns, `None` for global events
    pub target_id: Option<String>,

    pub message: String,

    pub delta_percent: Option<f64>,

    pub created_at: DateTime<Utc>,
}

impl Event {
    /// A global event with no target and no delta.
    pub fn new(id: String, kind: EventKind, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kind,
            target_id: None,
            message: message.into(),
            delta_percent: None,
            created_at: now,
        }
    }

    pub fn with_target(mut self, citizen_id: impl Into<String>) -> Self {
        self.target_id = Some(citizen_id.into());
        self
    }

    pub fn with_delta(mut self, delta_percent: f64) -> Self {
        self.delta_percent = Some(delta_percent);
        self
    }

    pub fn is_global(&self) -> bool {
        self.target_id.is_none()
    }
}
