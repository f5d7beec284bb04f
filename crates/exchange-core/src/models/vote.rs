//! Vote model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MarketError;

/// Direction of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Affirm,
    Doubt,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Affirm => "affirm",
            Self::Doubt => "doubt",
        }
    }

    /// Affirm lifts, doubt lowers.
    pub fn signed_delta(&self, weight: f64) -> f64 {
        match self {
            Self::Affirm => weight,
            Self::Doubt => -weight,
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Affirm => "affirmed",
            Self::Doubt => "doubted",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteType {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "affirm" => Ok(Self::Affirm),
            "doubt" => Ok(Self::Doubt),
            other => Err(MarketError::invalid(format!("unknown vote type '{other}'"))),
        }
    }
}

/// One cast vote. Never updated after it is written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: String,
    pub actor_id: String,
    pub target_citizen_id: String,
    pub vote_type: VoteType,
    /// Drawn from [0.5, 1.0)
    pub weight: f64,
    /// UTC day the per-target limit is counted against
    pub created_utc_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(
        id: String,
        actor_id: String,
        target_citizen_id: String,
        vote_type: VoteType,
        weight: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            actor_id,
            target_citizen_id,
            vote_type,
            weight,
            created_utc_date: now.date_naive(),
            created_at: now,
        }
    }
}
