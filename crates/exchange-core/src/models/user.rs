//! User model - the player behind a citizen.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dice::Dice;
use crate::vote::DAILY_QUOTA;

/// Prefixes a generated alias is drawn from.
pub const ALIAS_PREFIXES: [&str; 5] = ["Citizen", "Subject", "Entity", "Unit", "Asset"];

/// Draw an alias of the form `<Prefix>-NNNN`, number in `1..=9999`.
pub fn generate_alias(dice: &dyn Dice) -> String {
    let pick = (dice.unit() * ALIAS_PREFIXES.len() as f64) as usize;
    let prefix = ALIAS_PREFIXES[pick.min(ALIAS_PREFIXES.len() - 1)];
    let number = (dice.unit() * 9999.0) as u32 + 1;
    format!("{prefix}-{number:04}")
}

/// A registered player. Holds the daily vote quota.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,

    pub alias: String,

    /// Votes left on `quota_reset_date`
    pub daily_quota_remaining: u32,

    /// UTC day the quota was last reset
    pub quota_reset_date: NaiveDate,

    /// Registration time, anchors the new-account cooldown
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: String, alias: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            alias,
            daily_quota_remaining: DAILY_QUOTA,
            quota_reset_date: now.date_naive(),
            created_at: now,
        }
    }

    /// Quota as it stands on `today`, without touching the record.
    pub fn quota_on(&self, today: NaiveDate) -> u32 {
        if self.quota_reset_date == today {
            self.daily_quota_remaining
        } else {
            DAILY_QUOTA
        }
    }

    /// Reset the quota if the UTC day has changed. Returns true on reset.
    pub fn roll_quota(&mut self, today: NaiveDate) -> bool {
        if self.quota_reset_date == today {
            return false;
        }
        self.daily_quota_remaining = DAILY_QUOTA;
        self.quota_reset_date = today;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;
    use chrono::{Duration, TimeZone};

    #[test]
    fn alias_shape() {
        assert_eq!(generate_alias(&ScriptedDice::new([0.0, 0.0])), "Citizen-0001");
        assert_eq!(generate_alias(&ScriptedDice::new([0.65, 0.5])), "Unit-5000");
        assert_eq!(generate_alias(&ScriptedDice::new([0.9999, 0.9999])), "Asset-9999");
    }

    #[test]
    fn quota_resets_once_per_day() {
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        let mut user = User::new("u1".into(), "Citizen-0001".into(), now);
        user.daily_quota_remaining = 3;

        // Same day: no reset.
        assert!(!user.roll_quota(now.date_naive()));
        assert_eq!(user.daily_quota_remaining, 3);

        let tomorrow = (now + Duration::days(1)).date_naive();
        assert_eq!(user.quota_on(tomorrow), DAILY_QUOTA);
        assert!(user.roll_quota(tomorrow));
        assert_eq!(user.daily_quota_remaining, DAILY_QUOTA);

        user.daily_quota_remaining = 5;
        assert!(!user.roll_quota(tomorrow));
        assert_eq!(user.daily_quota_remaining, 5);
    }
}
