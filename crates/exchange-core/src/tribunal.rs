//! Tribunal event selection.
//!
//! One table drives selection. A draw `r ∈ [0, 1)` walks the table, summing
//! weights, and stops at the first entry whose running sum reaches `r`.
//! Adding a kind means adding one row.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dice::Dice;
use crate::error::MarketError;
use crate::index::round2;
use crate::models::EventKind;

/// Selection weights. Must sum to 1.
pub const TRIBUNAL_WEIGHTS: [(TribunalKind, f64); 4] = [
    (TribunalKind::SectorUplift, 0.40),
    (TribunalKind::SectorCrash, 0.30),
    (TribunalKind::ObservationHalt, 0.15),
    (TribunalKind::SanctionWave, 0.15),
];

/// Length of an Observation Halt.
pub const HALT_MINUTES: i64 = 2;

/// How many of the richest citizens a Sanction Wave hits.
pub const SANCTION_TOP_N: usize = 10;

/// A scheduled market shock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TribunalKind {
    SectorUplift,
    SectorCrash,
    ObservationHalt,
    SanctionWave,
}

impl TribunalKind {
    /// Cumulative-threshold pick for a draw in `[0, 1)`.
    pub fn pick(r: f64) -> Self {
        let mut acc = 0.0;
        for (kind, weight) in TRIBUNAL_WEIGHTS {
            acc += weight;
            if acc >= r {
                return kind;
            }
        }
        TRIBUNAL_WEIGHTS[TRIBUNAL_WEIGHTS.len() - 1].0
    }

    pub fn draw(dice: &dyn Dice) -> Self {
        Self::pick(dice.unit())
    }

    /// Magnitude range in percent, `None` for kinds that move no Index.
    pub fn magnitude_range(&self) -> Option<(f64, f64)> {
        match self {
            Self::SectorUplift | Self::SectorCrash => Some((2.0, 5.0)),
            Self::SanctionWave => Some((5.0, 10.0)),
            Self::ObservationHalt => None,
        }
    }

    /// Signed base delta for a magnitude.
    pub fn signed(&self, magnitude: f64) -> f64 {
        match self {
            Self::SectorUplift => magnitude.abs(),
            Self::SectorCrash | Self::SanctionWave => -magnitude.abs(),
            Self::ObservationHalt => 0.0,
        }
    }

    /// Draw this kind's signed base delta, rounded to cents.
    pub fn draw_delta(&self, dice: &dyn Dice) -> f64 {
        match self.magnitude_range() {
            Some((low, high)) => self.signed(round2(dice.uniform(low, high))),
            None => 0.0,
        }
    }

    /// Halts are never suppressed by an active halt; everything else is.
    pub fn is_market_impacting(&self) -> bool {
        !matches!(self, Self::ObservationHalt)
    }

    pub fn halt_length() -> Duration {
        Duration::minutes(HALT_MINUTES)
    }

    pub fn event_kind(&self) -> EventKind {
        match self {
            Self::SectorUplift => EventKind::SectorUplift,
            Self::SectorCrash => EventKind::SectorCrash,
            Self::ObservationHalt => EventKind::ObservationHalt,
            Self::SanctionWave => EventKind::SanctionWave,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.event_kind().as_str()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SectorUplift => "Sector Uplift",
            Self::SectorCrash => "Sector Crash",
            Self::ObservationHalt => "Observation Halt",
            Self::SanctionWave => "Sanction Wave",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::SectorUplift => "Global positive market movement",
            Self::SectorCrash => "Global negative market movement",
            Self::ObservationHalt => "Market freeze for 2 minutes",
            Self::SanctionWave => "Top 10 citizens penalized",
        }
    }

    pub fn default_delta(&self) -> f64 {
        match self {
            Self::SectorUplift => 3.5,
            Self::SectorCrash => -3.5,
            Self::ObservationHalt => 0.0,
            Self::SanctionWave => -10.0,
        }
    }
}

impl fmt::Display for TribunalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TribunalKind {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TRIBUNAL_WEIGHTS
            .iter()
            .map(|(kind, _)| *kind)
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| MarketError::invalid(format!("unknown tribunal event type '{s}'")))
    }
}

/// Catalog entry describing a tribunal kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TribunalTypeInfo {
    #[serde(rename = "type")]
    pub kind: TribunalKind,
    pub name: String,
    pub description: String,
    pub default_delta: f64,
}

/// Every tribunal kind, in table order.
pub fn catalog() -> Vec<TribunalTypeInfo> {
    TRIBUNAL_WEIGHTS
        .iter()
        .map(|(kind, _)| TribunalTypeInfo {
            kind: *kind,
            name: kind.display_name().to_string(),
            description: kind.description().to_string(),
            default_delta: kind.default_delta(),
        })
        .collect()
}
