//! Stability Protocol pricing and activation rules.
//!
//! Price = base% of Index × wealth surcharge, floored at a minimum per
//! duration, rounded to cents:
//!
//! ```text
//! DURATION   BASE    MIN COST
//! ─────────────────────────────
//!  10 min    1.0%    0.50
//!  20 min    1.8%    0.90
//!  30 min    2.5%    1.25
//!
//! INDEX        SURCHARGE
//! ──────────────────────
//!  < 1,000       ×1.00
//!  ≥ 1,000       ×1.25
//!  ≥ 10,000      ×1.50
//!  ≥ 50,000      ×1.75
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, MarketResult};
use crate::index::round2;
use crate::models::Citizen;

/// Minutes between two activations.
pub const COOLDOWN_MINUTES: i64 = 60;

/// Protection minutes a citizen may buy per UTC day.
pub const DAILY_CAP_MINUTES: u32 = 60;

/// A purchase may not leave the Index below this.
pub const MIN_INDEX_AFTER_PURCHASE: f64 = 5.0;

/// Wealth thresholds, highest first.
const SURCHARGE_TIERS: [(f64, f64); 3] = [(50_000.0, 1.75), (10_000.0, 1.5), (1_000.0, 1.25)];

/// A purchasable protection window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum StabilityDuration {
    Ten,
    Twenty,
    Thirty,
}

impl StabilityDuration {
    pub const ALL: [StabilityDuration; 3] = [Self::Ten, Self::Twenty, Self::Thirty];

    pub fn minutes(&self) -> u32 {
        match self {
            Self::Ten => 10,
            Self::Twenty => 20,
            Self::Thirty => 30,
        }
    }

    /// Percent of the current Index charged before surcharge.
    pub fn base_percent(&self) -> f64 {
        match self {
            Self::Ten => 1.0,
            Self::Twenty => 1.8,
            Self::Thirty => 2.5,
        }
    }

    /// Absolute floor on the cost.
    pub fn min_cost(&self) -> f64 {
        match self {
            Self::Ten => 0.5,
            Self::Twenty => 0.9,
            Self::Thirty => 1.25,
        }
    }

    pub fn length(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes()))
    }
}

impl TryFrom<u32> for StabilityDuration {
    type Error = MarketError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        match minutes {
            10 => Ok(Self::Ten),
            20 => Ok(Self::Twenty),
            30 => Ok(Self::Thirty),
            other => Err(MarketError::InvalidDuration(other)),
        }
    }
}

impl From<StabilityDuration> for u32 {
    fn from(d: StabilityDuration) -> u32 {
        d.minutes()
    }
}

/// Surcharge multiplier for an Index.
pub fn wealth_surcharge(index: f64) -> f64 {
    SURCHARGE_TIERS
        .iter()
        .find(|(threshold, _)| index >= *threshold)
        .map(|(_, multiplier)| *multiplier)
        .unwrap_or(1.0)
}

/// Price of one duration at one Index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityQuote {
    pub duration_minutes: u32,
    pub base_percent: f64,
    pub surcharge: f64,
    pub cost: f64,
}

impl StabilityQuote {
    pub fn for_index(index: f64, duration: StabilityDuration) -> Self {
        let surcharge = wealth_surcharge(index);
        let raw = index * duration.base_percent() / 100.0 * surcharge;
        let cost = round2(raw.max(duration.min_cost()));
        Self {
            duration_minutes: duration.minutes(),
            base_percent: duration.base_percent(),
            surcharge,
            cost,
        }
    }

    /// Quotes for every duration.
    pub fn all_for_index(index: f64) -> Vec<Self> {
        StabilityDuration::ALL
            .iter()
            .map(|d| Self::for_index(index, *d))
            .collect()
    }
}

/// A validated purchase, ready to be written onto the citizen.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityPlan {
    pub duration: StabilityDuration,
    pub quote: StabilityQuote,
    pub index_before: f64,
    pub new_index: f64,
    pub expires_at: DateTime<Utc>,
    pub protection_day: NaiveDate,
    pub protection_minutes_today: u32,
}

impl StabilityPlan {
    /// Check a purchase against the citizen as it stands now.
    ///
    /// Order: already active, cooldown, daily cap, Index floor.
    pub fn prepare(
        citizen: &Citizen,
        duration: StabilityDuration,
        now: DateTime<Utc>,
    ) -> MarketResult<Self> {
        if citizen.stability_in_effect(now) {
            return Err(MarketError::AlreadyActive);
        }

        if let Some(last) = citizen.stability_last_activated_at {
            if now - last < Duration::minutes(COOLDOWN_MINUTES) {
                return Err(MarketError::Cooldown);
            }
        }

        let today = now.date_naive();
        let used = citizen.protection_minutes_on(today);
        if used + duration.minutes() > DAILY_CAP_MINUTES {
            return Err(MarketError::DailyCapReached);
        }

        let quote = StabilityQuote::for_index(citizen.index_value, duration);
        let new_index = round2(citizen.index_value - quote.cost);
        if new_index < MIN_INDEX_AFTER_PURCHASE {
            return Err(MarketError::IndexTooLow);
        }

        Ok(Self {
            duration,
            quote,
            index_before: citizen.index_value,
            new_index,
            expires_at: now + duration.length(),
            protection_day: today,
            protection_minutes_today: used + duration.minutes(),
        })
    }

    /// Write the purchase onto the citizen.
    pub fn apply_to(&self, citizen: &mut Citizen, now: DateTime<Utc>) {
        citizen.set_index(self.new_index, now);
        citizen.stability_active = true;
        citizen.stability_expires_at = Some(self.expires_at);
        citizen.stability_last_activated_at = Some(now);
        citizen.protection_day = Some(self.protection_day);
        citizen.protection_minutes_today = self.protection_minutes_today;
    }

    /// Cost as a percentage of the pre-purchase Index, negative.
    pub fn cost_percent(&self) -> f64 {
        if self.index_before <= 0.0 {
            return 0.0;
        }
        round2(-self.quote.cost / self.index_before * 100.0)
    }
}
