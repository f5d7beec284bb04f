//! Loop timings and per-tick draws for the background schedulers.

use chrono::{DateTime, Days, Utc};
use std::time::Duration;

use crate::dice::Dice;

/// Drift move magnitude range, in percent.
pub const DRIFT_MIN_DELTA: f64 = 0.2;
pub const DRIFT_MAX_DELTA: f64 = 0.6;

/// Timings for the drift and tribunal loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTimings {
    /// Shortest pause between drift ticks
    pub drift_min: Duration,
    /// Longest pause between drift ticks
    pub drift_max: Duration,
    /// Nominal pause between tribunal ticks
    pub tribunal_base: Duration,
    /// Uniform jitter applied either side of `tribunal_base`
    pub tribunal_jitter: Duration,
    /// Lower bound on the tribunal pause
    pub tribunal_floor: Duration,
}

impl Default for ScheduleTimings {
    fn default() -> Self {
        Self {
            drift_min: Duration::from_secs(60),
            drift_max: Duration::from_secs(120),
            tribunal_base: Duration::from_secs(10 * 60),
            tribunal_jitter: Duration::from_secs(2 * 60),
            tribunal_floor: Duration::from_secs(60),
        }
    }
}

impl ScheduleTimings {
    /// Pause before the next drift tick, uniform in `[drift_min, drift_max)`.
    pub fn drift_delay(&self, dice: &dyn Dice) -> Duration {
        let low = self.drift_min.as_secs_f64();
        let high = self.drift_max.as_secs_f64().max(low);
        Duration::from_secs_f64(dice.uniform(low, high))
    }

    /// Pause before the next tribunal tick: base ± jitter, floored.
    pub fn tribunal_delay(&self, dice: &dyn Dice) -> Duration {
        let jitter = self.tribunal_jitter.as_secs_f64();
        let secs = self.tribunal_base.as_secs_f64() + dice.uniform(-jitter, jitter);
        Duration::from_secs_f64(secs.max(self.tribunal_floor.as_secs_f64()))
    }
}

/// Signed drift move for one citizen: magnitude in `[0.2, 0.6)`, fair sign.
pub fn drift_delta(dice: &dyn Dice) -> f64 {
    let magnitude = dice.uniform(DRIFT_MIN_DELTA, DRIFT_MAX_DELTA);
    if dice.coin() {
        -magnitude
    } else {
        magnitude
    }
}

/// The next UTC midnight strictly after `now`.
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or(chrono::NaiveDate::MAX);
    tomorrow.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Time left until the next UTC midnight.
pub fn until_next_utc_midnight(now: DateTime<Utc>) -> Duration {
    (next_utc_midnight(now) - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;
    use chrono::TimeZone;

    #[test]
    fn drift_delay_range() {
        let t = ScheduleTimings::default();
        assert_eq!(t.drift_delay(&ScriptedDice::constant(0.0)), Duration::from_secs(60));
        assert_eq!(t.drift_delay(&ScriptedDice::constant(0.5)), Duration::from_secs(90));
    }

    #[test]
    fn tribunal_delay_jitter_and_floor() {
        let t = ScheduleTimings::default();
        assert_eq!(t.tribunal_delay(&ScriptedDice::constant(0.0)), Duration::from_secs(480));
        assert_eq!(t.tribunal_delay(&ScriptedDice::constant(0.5)), Duration::from_secs(600));

        let tight = ScheduleTimings {
            tribunal_base: Duration::from_secs(30),
            ..t
        };
        assert_eq!(tight.tribunal_delay(&ScriptedDice::constant(0.0)), Duration::from_secs(60));
    }

    #[test]
    fn drift_delta_sign_and_magnitude() {
        // First draw is the magnitude, second the coin.
        let down = ScriptedDice::new([0.5, 0.1]);
        assert!((drift_delta(&down) + 0.4).abs() < 1e-9);
        let up = ScriptedDice::new([0.0, 0.9]);
        assert!((drift_delta(&up) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn midnight_delay() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 30, 0).unwrap();
        assert_eq!(
            next_utc_midnight(now),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(until_next_utc_midnight(now), Duration::from_secs(30 * 60));

        // Exactly at midnight, the next one is a full day away.
        let midnight = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(until_next_utc_midnight(midnight), Duration::from_secs(86_400));
    }
}
