//! System state singleton - the Market Halt Gate.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Process-wide market state. One record, stored under a fixed key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemState {
    /// Market-impacting mutations are suspended until this instant
    pub market_halt_until: Option<DateTime<Utc>>,

    /// Last tribunal tick that changed state
    pub last_tribunal_at: Option<DateTime<Utc>>,
}

impl SystemState {
    /// Store key of the singleton.
    pub const KEY: &'static str = "system:state";

    /// A halt clears itself: expiry is only ever a comparison against `now`.
    pub fn is_halted(&self, now: DateTime<Utc>) -> bool {
        self.market_halt_until.is_some_and(|until| until > now)
    }

    pub fn halt_for(&mut self, now: DateTime<Utc>, length: Duration) {
        self.market_halt_until = Some(now + length);
        self.last_tribunal_at = Some(now);
    }
}
