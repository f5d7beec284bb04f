//! Citizen model - the identity whose Index is traded.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::index::round2;

/// Index every citizen starts with.
pub const STARTING_INDEX: f64 = 100.0;

/// A citizen of the exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Citizen {
    /// Opaque identifier
    pub id: String,

    /// User that owns this citizen
    pub owner_id: String,

    /// Display alias, copied from the owner at registration
    pub alias: String,

    /// Current Index, never negative, two decimals
    pub index_value: f64,

    /// Whether a Stability Protocol window was purchased
    #[serde(default)]
    pub stability_active: bool,

    /// End of the current stability window
    pub stability_expires_at: Option<DateTime<Utc>>,

    /// Start of the most recent stability window (cooldown anchor)
    pub stability_last_activated_at: Option<DateTime<Utc>>,

    /// Protection minutes bought on `protection_day`
    #[serde(default)]
    pub protection_minutes_today: u32,

    /// UTC day `protection_minutes_today` belongs to
    pub protection_day: Option<NaiveDate>,

    /// Index captured at the last UTC midnight
    pub index_value_at_midnight_utc: f64,

    pub last_updated: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl Citizen {
    /// Create a citizen at the starting Index.
    pub fn new(id: String, owner_id: String, alias: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id,
            alias,
            index_value: STARTING_INDEX,
            stability_active: false,
            stability_expires_at: None,
            stability_last_activated_at: None,
            protection_minutes_today: 0,
            protection_day: None,
            index_value_at_midnight_utc: STARTING_INDEX,
            last_updated: now,
            created_at: now,
        }
    }

    /// Stability dampens losses only while its window is open.
    pub fn stability_in_effect(&self, now: DateTime<Utc>) -> bool {
        self.stability_active && self.stability_expires_at.is_some_and(|until| until > now)
    }

    /// Protection minutes already used on `today`.
    pub fn protection_minutes_on(&self, today: NaiveDate) -> u32 {
        if self.protection_day == Some(today) {
            self.protection_minutes_today
        } else {
            0
        }
    }

    /// Movement since the last midnight snapshot, in percent.
    pub fn percent_change_today(&self) -> Option<f64> {
        if self.index_value_at_midnight_utc <= 0.0 {
            return None;
        }
        let change = (self.index_value - self.index_value_at_midnight_utc)
            / self.index_value_at_midnight_utc
            * 100.0;
        Some(round2(change))
    }

    /// Store a new Index value.
    pub fn set_index(&mut self, value: f64, now: DateTime<Utc>) {
        self.index_value = round2(value.max(0.0));
        self.last_updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, h, m, 0).unwrap()
    }

    #[test]
    fn new_citizen() {
        let c = Citizen::new("c1".into(), "u1".into(), "Unit-0042".into(), at(9, 0));
        assert_eq!(c.index_value, 100.0);
        assert_eq!(c.index_value_at_midnight_utc, 100.0);
        assert!(!c.stability_in_effect(at(9, 0)));
    }

    #[test]
    fn stability_expires_by_timestamp() {
        let mut c = Citizen::new("c1".into(), "u1".into(), "Unit-0042".into(), at(9, 0));
        c.stability_active = true;
        c.stability_expires_at = Some(at(9, 0) + Duration::minutes(10));
        assert!(c.stability_in_effect(at(9, 5)));
        assert!(!c.stability_in_effect(at(9, 10)));
    }

    #[test]
    fn protection_minutes_reset_with_day() {
        let mut c = Citizen::new("c1".into(), "u1".into(), "Asset-0001".into(), at(9, 0));
        c.protection_minutes_today = 40;
        c.protection_day = Some(at(9, 0).date_naive());
        assert_eq!(c.protection_minutes_on(at(9, 0).date_naive()), 40);
        let tomorrow = (at(9, 0) + Duration::days(1)).date_naive();
        assert_eq!(c.protection_minutes_on(tomorrow), 0);
    }

    #[test]
    fn percent_change_today() {
        let mut c = Citizen::new("c1".into(), "u1".into(), "Entity-0100".into(), at(9, 0));
        c.set_index(103.5, at(10, 0));
        assert_eq!(c.percent_change_today(), Some(3.5));
        c.index_value_at_midnight_utc = 0.0;
        assert_eq!(c.percent_change_today(), None);
    }

    #[test]
    fn serialize_deserialize() {
        let c = Citizen::new("c1".into(), "u1".into(), "Subject-0007".into(), at(9, 0));
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"indexValue\""));
        let parsed: Citizen = serde_json::from_str(&json).unwrap();
        assert_eq!(c, parsed);
    }
}
