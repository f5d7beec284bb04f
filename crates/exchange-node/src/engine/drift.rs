//! Background drift: small random moves for every citizen.

use super::Market;
use exchange_core::schedule::drift_delta;
use exchange_core::MarketResult;
use serde::Serialize;

/// Summary of one drift tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub updated: usize,
    pub failed: usize,
    /// The tick found the market halted and did nothing
    pub halted: bool,
}

impl Market {
    /// Nudge every citizen by a fresh draw. Writes no events.
    pub fn drift_tick(&self) -> MarketResult<DriftReport> {
        let now = self.now();
        if self.store.system_state()?.is_halted(now) {
            return Ok(DriftReport {
                halted: true,
                ..DriftReport::default()
            });
        }

        let mut report = DriftReport::default();
        for citizen in self.store.list_citizens()? {
            let delta = drift_delta(self.dice.as_ref());
            match self.move_citizen(&citizen.id, delta, now) {
                Ok(Some(_)) => report.updated += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Drift failed for {}: {}", citizen.id, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}
