//! Midnight snapshot: the baseline for "percent change today".

use super::Market;
use exchange_core::{EventKind, MarketResult};

impl Market {
    /// Copy every live Index into its midnight baseline. Returns how many
    /// citizens were captured.
    pub fn midnight_snapshot(&self) -> MarketResult<usize> {
        let now = self.now();
        let captured = self.store.snapshot_midnight(now)?;

        let event = self
            .event(EventKind::MidnightSnapshot, "Midnight snapshot captured.", now)
            .with_delta(0.0);
        self.store.append_event(&event)?;

        tracing::info!("Midnight snapshot captured {} citizens", captured);
        Ok(captured)
    }
}
