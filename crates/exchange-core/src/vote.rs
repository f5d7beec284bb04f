//! Vote rules: quotas, per-target limits, new-account cooldown, weights.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::dice::Dice;
use crate::models::VoteType;

/// Votes a user may cast per UTC day.
pub const DAILY_QUOTA: u32 = 20;

/// Votes of one type an actor may cast on one target per UTC day.
pub const PER_TARGET_DAILY_LIMIT: usize = 2;

/// Minutes a new account waits before it may vote.
pub const ACCOUNT_COOLDOWN_MINUTES: i64 = 10;

/// Vote weight range, in percent. Upper bound exclusive.
pub const WEIGHT_MIN: f64 = 0.5;
pub const WEIGHT_MAX: f64 = 1.0;

/// Draw the weight of one vote.
pub fn draw_weight(dice: &dyn Dice) -> f64 {
    dice.uniform(WEIGHT_MIN, WEIGHT_MAX)
}

/// Whether an account registered at `created_at` may vote at `now`.
pub fn account_ready(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - created_at >= Duration::minutes(ACCOUNT_COOLDOWN_MINUTES)
}

/// Same-type votes left for a target, given how many were cast today.
pub fn per_target_remaining(cast_today: usize) -> usize {
    PER_TARGET_DAILY_LIMIT.saturating_sub(cast_today)
}

/// Remaining same-type votes on one target, by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerTypeRemaining {
    pub affirm: usize,
    pub doubt: usize,
}

impl PerTypeRemaining {
    pub fn from_counts(affirm_today: usize, doubt_today: usize) -> Self {
        Self {
            affirm: per_target_remaining(affirm_today),
            doubt: per_target_remaining(doubt_today),
        }
    }

    pub fn get(&self, vote_type: VoteType) -> usize {
        match vote_type {
            VoteType::Affirm => self.affirm,
            VoteType::Doubt => self.doubt,
        }
    }
}

/// What an actor may still do today against one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub daily_remaining: u32,
    pub per_type_remaining: PerTypeRemaining,
}
